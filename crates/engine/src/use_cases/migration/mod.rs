//! Migration use cases.

mod transfer_entity;

pub use transfer_entity::{
    MigrationConfig, MigrationError, MigrationReport, Recovery, TransferEntity,
};
