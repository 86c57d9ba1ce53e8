use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Target resource of a request, as a list of Uri-Path segments.
///
/// Rendered and parsed as `/seg/seg/seg`. The root path has no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Builds a path from segments, rejecting any that contain `/`.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(bad) = segments.iter().find(|s| s.contains('/')) {
            return Err(ProtocolError::InvalidPath(format!(
                "segment contains '/': {bad}"
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourcePath {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(ProtocolError::InvalidPath(format!(
                "path must start with '/': {s}"
            )));
        };
        if rest.is_empty() {
            return Ok(Self::default());
        }
        let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ProtocolError::InvalidPath(format!("empty segment in {s}")));
        }
        Ok(Self { segments })
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path: ResourcePath = "/1337/1/5".parse().unwrap();
        assert_eq!(path.segments(), ["1337", "1", "5"]);
        assert_eq!(path.to_string(), "/1337/1/5");
    }

    #[test]
    fn root_path() {
        let path: ResourcePath = "/".parse().unwrap();
        assert!(path.is_root());
        assert_eq!(path.to_string(), "/");
    }

    #[test]
    fn rejects_relative_path() {
        assert!("1337/1/5".parse::<ResourcePath>().is_err());
    }

    #[test]
    fn rejects_empty_segment() {
        assert!("/1337//5".parse::<ResourcePath>().is_err());
        assert!("/1337/".parse::<ResourcePath>().is_err());
    }

    #[test]
    fn from_segments_rejects_slash() {
        assert!(ResourcePath::from_segments(["a/b"]).is_err());
        assert!(ResourcePath::from_segments(["3", "0", "2"]).is_ok());
    }

    #[test]
    fn serde_as_string() {
        #[derive(Deserialize)]
        struct Holder {
            path: ResourcePath,
        }
        let holder: Holder = toml::from_str(r#"path = "/3/0/2""#).unwrap();
        assert_eq!(holder.path.segments(), ["3", "0", "2"]);

        let bad = toml::from_str::<Holder>(r#"path = "3/0/2""#);
        assert!(bad.is_err());
    }
}
