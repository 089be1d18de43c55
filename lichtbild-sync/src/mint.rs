use lichtbild_common::{
    model::{Id, LichtbildSnowflakeGenerator},
    snowflake::NodeId,
};
use std::sync::{Mutex, PoisonError};
use time::UtcDateTime;

/// Shared snowflake source for post and comment ids.
///
/// Ids are minted on the client, before the remote write, so the id an
/// optimistic mutation carries is already the authoritative one.
#[derive(Debug)]
pub struct IdMint {
    generator: Mutex<LichtbildSnowflakeGenerator>,
}

impl IdMint {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            generator: Mutex::new(LichtbildSnowflakeGenerator::new(node_id)),
        }
    }

    #[must_use]
    pub fn mint<Marker>(&self) -> Id<Marker> {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .into()
    }

    #[must_use]
    pub fn mint_at<Marker>(&self, time: UtcDateTime) -> Id<Marker> {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_at(time)
            .into()
    }
}
