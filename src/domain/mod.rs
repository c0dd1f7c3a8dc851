//! Domain layer - Core business objects and the seams to the outside world
//! 
//! This layer contains:
//! - Entities: identities, inbound events, invocations, binding records
//! - Traits: the protocol client handle and the extension lifecycle

pub mod entities;
pub mod traits;
