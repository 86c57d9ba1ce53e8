fn main() {
    println!("Run `cargo test -p block-scenarios` to replay the block-wise scenarios over UDP.");
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::UdpSocket;
    use tokio::task::JoinHandle;

    use blockwise_protocol::constants::{OPTION_BLOCK1, OPTION_MAX_AGE, OPTION_SIZE2};
    use blockwise_protocol::{BlockDescriptor, Code, Message, MessageKind, ResourcePath, codec};
    use blockwise_server::{BlockServer, MAX_DATAGRAM_SIZE, ServerConfig, ServerError};
    use blockwise_transfer::{
        BlockEngine, EngineConfig, FileResource, PatternResource, SourceRegistry,
    };

    const BYTES: &str = "/1337/1/5";
    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    /// A running server plus a client socket talking to it.
    struct Scenario {
        server: Arc<BlockServer<SourceRegistry>>,
        task: JoinHandle<Result<(), ServerError>>,
        client: UdpSocket,
        resource: Arc<PatternResource>,
        next_id: u16,
    }

    impl Scenario {
        async fn start(size: usize) -> Self {
            Self::with_registry(size, SourceRegistry::new()).await
        }

        async fn with_registry(size: usize, mut registry: SourceRegistry) -> Self {
            let resource = Arc::new(PatternResource::new(size, 1000));
            registry.register(path(BYTES), resource.clone());
            let engine = BlockEngine::new(registry, EngineConfig::default()).unwrap();
            let config = ServerConfig {
                bind: Ipv4Addr::LOCALHOST.into(),
                port: 0,
            };
            let server = BlockServer::bind(&config, engine).await.unwrap();
            let task = tokio::spawn({
                let server = Arc::clone(&server);
                async move { server.run().await }
            });
            let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            Self {
                server,
                task,
                client,
                resource,
                next_id: 0x100,
            }
        }

        fn server_addr(&self) -> SocketAddr {
            self.server.local_addr()
        }

        fn request(&mut self, target: &str, block: Option<(u32, u16)>) -> Message {
            self.next_id = self.next_id.wrapping_add(1);
            let token = self.next_id.to_be_bytes();
            let mut msg = Message::get(MessageKind::Confirmable, self.next_id, &token, &path(target));
            if let Some((seq, size)) = block {
                msg.set_block2(&BlockDescriptor::new(seq, false, size)).unwrap();
            }
            msg
        }

        async fn exchange_raw(&self, datagram: &[u8]) -> Vec<u8> {
            self.client.send_to(datagram, self.server_addr()).await.unwrap();
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            let (len, from) = tokio::time::timeout(RECV_TIMEOUT, self.client.recv_from(&mut buf))
                .await
                .expect("no response from server")
                .unwrap();
            assert_eq!(from, self.server_addr());
            buf.truncate(len);
            buf
        }

        async fn exchange(&self, msg: &Message) -> Message {
            let reply = self.exchange_raw(&codec::encode(msg).unwrap()).await;
            let reply = codec::decode(&reply).unwrap();
            assert_eq!(reply.token, msg.token);
            if msg.kind == MessageKind::Confirmable {
                assert_eq!(reply.kind, MessageKind::Acknowledgement);
                assert_eq!(reply.message_id, msg.message_id);
            }
            reply
        }

        async fn read(&mut self, block: Option<(u32, u16)>) -> Message {
            let msg = self.request(BYTES, block);
            self.exchange(&msg).await
        }

        /// Reads blocks `seq..` at `block_size` until the final one.
        async fn read_rest(&mut self, block_size: u16, mut seq: u32) -> Vec<u8> {
            let mut data = Vec::new();
            loop {
                let reply = self.read(Some((seq, block_size))).await;
                assert_eq!(reply.code, Code::CONTENT, "block {seq}");
                let block = block2(&reply);
                assert_eq!((block.seq_num, block.block_size), (seq, block_size));
                data.extend_from_slice(&reply.payload);
                if !block.has_more {
                    return data;
                }
                seq += 1;
            }
        }

        async fn stop(self) {
            self.server.shutdown();
            self.task.await.unwrap().unwrap();
        }
    }

    fn path(s: &str) -> ResourcePath {
        s.parse().unwrap()
    }

    fn block2(reply: &Message) -> BlockDescriptor {
        reply.block2().unwrap().expect("response without Block2")
    }

    fn pattern(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i % 128) as u8).collect()
    }

    #[tokio::test]
    async fn negotiation_on_first_request() {
        let mut s = Scenario::start(9001).await;

        let first = s.read(None).await;
        assert_eq!(first.code, Code::CONTENT);
        assert_eq!(block2(&first), BlockDescriptor::new(0, true, 1024));
        assert_eq!(first.uint_option(OPTION_SIZE2).unwrap(), Some(9001));

        let mut data = first.payload.clone();
        data.extend(s.read_rest(1024, 1).await);
        assert_eq!(data, pattern(9001));
        s.stop().await;
    }

    #[tokio::test]
    async fn block_counts_for_nine_thousand_bytes() {
        let mut s = Scenario::start(9001).await;
        let mut sizes = vec![s.read(None).await.payload.len()];
        for seq in 1..=8 {
            let reply = s.read(Some((seq, 1024))).await;
            assert_eq!(block2(&reply).has_more, seq < 8);
            sizes.push(reply.payload.len());
        }
        assert_eq!(sizes, [1024, 1024, 1024, 1024, 1024, 1024, 1024, 1024, 809]);
        s.stop().await;
    }

    #[tokio::test]
    async fn out_of_order_first_request() {
        let mut s = Scenario::start(9001).await;
        let reply = s.read(Some((1, 1024))).await;
        assert_eq!(reply.code, Code::REQUEST_ENTITY_INCOMPLETE);
        assert!(reply.payload.is_empty());

        let reply = s.read(Some((0, 1024))).await;
        assert_eq!(block2(&reply), BlockDescriptor::new(0, true, 1024));
        s.stop().await;
    }

    #[tokio::test]
    async fn renegotiation_yields_same_content() {
        let mut s = Scenario::start(9001).await;
        let small = s.read_rest(16, 0).await;
        assert_eq!(small, pattern(9001));
        assert_eq!(s.read_rest(1024, 0).await, small);
        assert_eq!(s.read_rest(32, 0).await, small);

        for size in [1024, 32, 16] {
            let reply = s.read(Some((0, size))).await;
            assert_eq!(block2(&reply), BlockDescriptor::new(0, true, size));
        }
        assert_eq!(s.read_rest(16, 1).await, small[16..].to_vec());
        s.stop().await;
    }

    #[tokio::test]
    async fn retransmission_gets_identical_datagram() {
        let mut s = Scenario::start(9001).await;
        let request = codec::encode(&s.request(BYTES, None)).unwrap();
        let first = s.exchange_raw(&request).await;
        let second = s.exchange_raw(&request).await;
        assert_eq!(first, second);

        let rest = s.read_rest(1024, 1).await;
        assert_eq!(rest.len(), 9001 - 1024);
        s.stop().await;
    }

    #[tokio::test]
    async fn unsupported_size_aborts_transfer() {
        let mut s = Scenario::start(9001).await;
        s.read(Some((0, 1024))).await;
        s.read(Some((1, 1024))).await;

        let reply = s.read(Some((2, 2048))).await;
        assert_eq!(reply.code, Code::BAD_REQUEST);

        let reply = s.read(Some((2, 1024))).await;
        assert_eq!(reply.code, Code::REQUEST_ENTITY_INCOMPLETE);

        assert_eq!(s.read_rest(1024, 0).await, pattern(9001));
        s.stop().await;
    }

    #[tokio::test]
    async fn mismatched_size_keeps_transfer() {
        let mut s = Scenario::start(9001).await;
        s.read(None).await;

        let reply = s.read(Some((1, 16))).await;
        assert_eq!(reply.code, Code::BAD_REQUEST);

        assert_eq!(s.read_rest(1024, 1).await, pattern(9001)[1024..].to_vec());
        s.stop().await;
    }

    #[tokio::test]
    async fn unrelated_requests_are_turned_away() {
        let mut s = Scenario::start(9001).await;
        let first = s.read(Some((0, 512))).await;

        let other = s.request("/3/0/2", None);
        let reply = s.exchange(&other).await;
        assert_eq!(reply.code, Code::SERVICE_UNAVAILABLE);
        assert_eq!(reply.uint_option(OPTION_MAX_AGE).unwrap(), Some(5));

        let mut write = s.request("/5/0/0", None);
        write.code = Code::PUT;
        write.add_option(OPTION_BLOCK1, BlockDescriptor::new(0, false, 16).serialize().unwrap());
        write.payload = vec![b'A'; 16];
        let reply = s.exchange(&write).await;
        assert_eq!(reply.code, Code::SERVICE_UNAVAILABLE);
        assert_eq!(reply.uint_option(OPTION_MAX_AGE).unwrap(), Some(5));

        let mut mixed = s.request(BYTES, Some((1, 512)));
        mixed.add_option(OPTION_BLOCK1, BlockDescriptor::new(0, true, 16).serialize().unwrap());
        assert_eq!(s.exchange(&mixed).await.code, Code::SERVICE_UNAVAILABLE);

        let mut data = first.payload.clone();
        data.extend(s.read_rest(512, 1).await);
        assert_eq!(data, pattern(9001));
        s.stop().await;
    }

    #[tokio::test]
    async fn burst_size_does_not_matter() {
        let mut s = Scenario::start(9001).await;
        for burst in [1, 10, 50, 100, 1000, 1024, 1200, 2048, 4096, 5000, 9001] {
            s.resource.set_burst(burst);
            assert_eq!(s.read_rest(1024, 0).await, pattern(9001), "burst {burst}");
        }
        s.stop().await;
    }

    #[tokio::test]
    async fn small_resource_fits_one_block() {
        let mut s = Scenario::start(5).await;
        let reply = s.read(Some((0, 1024))).await;
        assert_eq!(block2(&reply), BlockDescriptor::new(0, false, 1024));
        assert_eq!(reply.payload, pattern(5));

        let reply = s.read(Some((1, 1024))).await;
        assert_eq!(reply.code, Code::REQUEST_ENTITY_INCOMPLETE);
        s.stop().await;
    }

    #[tokio::test]
    async fn resized_resource_is_picked_up_on_fresh_start() {
        let mut s = Scenario::start(9001).await;
        s.read_rest(1024, 0).await;
        s.resource.set_size(3000);
        assert_eq!(s.read_rest(1024, 0).await, pattern(3000));
        s.stop().await;
    }

    #[tokio::test]
    async fn non_confirmable_read() {
        let mut s = Scenario::start(100).await;
        let mut msg = s.request(BYTES, Some((0, 64)));
        msg.kind = MessageKind::NonConfirmable;
        let reply = s.exchange(&msg).await;
        assert_eq!(reply.kind, MessageKind::NonConfirmable);
        assert_eq!(block2(&reply), BlockDescriptor::new(0, true, 64));
        s.stop().await;
    }

    #[tokio::test]
    async fn file_resource_over_udp() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("image.bin");
        let content: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 251) as u8).collect();
        std::fs::write(&file, &content).unwrap();

        let mut registry = SourceRegistry::new();
        registry.register(
            path("/fw/image"),
            Arc::new(FileResource::new(&file, path("/fw/image"), 100)),
        );
        let mut s = Scenario::with_registry(10, registry).await;

        let mut data = Vec::new();
        for seq in 0.. {
            let msg = s.request("/fw/image", Some((seq, 256)));
            let reply = s.exchange(&msg).await;
            assert_eq!(reply.code, Code::CONTENT);
            data.extend_from_slice(&reply.payload);
            if !block2(&reply).has_more {
                break;
            }
        }
        assert_eq!(data, content);

        let missing = s.request("/fw/other", None);
        assert_eq!(s.exchange(&missing).await.code, Code::NOT_FOUND);
        s.stop().await;
    }

    #[tokio::test]
    async fn ping_is_reset() {
        let s = Scenario::start(10).await;
        let ping = Message::new(MessageKind::Confirmable, Code::EMPTY, 0x4242);
        let reply = codec::decode(&s.exchange_raw(&codec::encode(&ping).unwrap()).await).unwrap();
        assert_eq!(reply.kind, MessageKind::Reset);
        assert_eq!(reply.message_id, 0x4242);
        s.stop().await;
    }
}
