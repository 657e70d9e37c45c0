use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use super::domain::{ProtocolDefect, ProtocolId, TreatmentProtocol};

/// Failure loading a protocol catalog file.
#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Defective {
        protocol_id: ProtocolId,
        defect: ProtocolDefect,
    },
    DuplicateProtocol(ProtocolId),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "failed to read protocol catalog: {}", err),
            CatalogError::Json(err) => write!(f, "invalid protocol catalog JSON: {}", err),
            CatalogError::Defective {
                protocol_id,
                defect,
            } => write!(f, "protocol {} is defective: {}", protocol_id, defect),
            CatalogError::DuplicateProtocol(id) => {
                write!(f, "protocol {} appears more than once", id)
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(err) => Some(err),
            CatalogError::Json(err) => Some(err),
            CatalogError::Defective { defect, .. } => Some(defect),
            CatalogError::DuplicateProtocol(_) => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

/// Loads a JSON array of protocols, rejecting defective or duplicated records up front.
pub struct ProtocolCatalog;

impl ProtocolCatalog {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<TreatmentProtocol>, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<TreatmentProtocol>, CatalogError> {
        let protocols: Vec<TreatmentProtocol> = serde_json::from_reader(reader)?;

        let mut seen = HashSet::new();
        for protocol in &protocols {
            protocol
                .validate()
                .map_err(|defect| CatalogError::Defective {
                    protocol_id: protocol.id.clone(),
                    defect,
                })?;
            if !seen.insert(protocol.id.clone()) {
                return Err(CatalogError::DuplicateProtocol(protocol.id.clone()));
            }
        }

        Ok(protocols)
    }
}
