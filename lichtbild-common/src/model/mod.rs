pub mod auth;
pub mod comment;
pub mod image;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::WeakPasswordError,
        comment::EmptyCommentTextError,
        image::ImageValidationError,
        user::{InvalidDisplayNameError, InvalidEmailError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    DisplayName(#[from] InvalidDisplayNameError),
    #[error(transparent)]
    CommentText(#[from] EmptyCommentTextError),
    #[error(transparent)]
    Image(#[from] ImageValidationError),
    #[error(transparent)]
    WeakPassword(#[from] WeakPasswordError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LichtbildEpoch;
impl Epoch for LichtbildEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type LichtbildSnowflake = Snowflake<LichtbildEpoch>;
pub type LichtbildSnowflakeGenerator = SnowflakeGenerator<LichtbildEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(LichtbildSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: LichtbildSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> LichtbildSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<LichtbildSnowflake> for Id<Marker> {
    fn from(value: LichtbildSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for LichtbildSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(LichtbildSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
