use serde::{Deserialize, Serialize};

/// Coarse connection class, mirroring the effective-type hint browsers expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[default]
    Unknown,
}

impl std::str::FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "slow-2g" => Ok(ConnectionType::Slow2g),
            "2g" => Ok(ConnectionType::TwoG),
            "3g" => Ok(ConnectionType::ThreeG),
            "4g" => Ok(ConnectionType::FourG),
            "unknown" | "" => Ok(ConnectionType::Unknown),
            other => Err(format!("unknown connection type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkHints {
    pub save_data: bool,
    pub connection: ConnectionType,
}
