//! tjoy-sequencer: hierarchical test sequences with multi-sequence switching,
//! cycle history, test discovery import and a backend message channel.

pub mod backend;
pub mod codec;
pub mod config;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod permission;
pub mod profile;
pub mod registry;
pub mod sequence;
pub mod sequencer;

pub use backend::{BackendChannel, BackendEvent, BackendGlobalState, BackendMessage};
pub use codec::{PickedFile, SequenceCodec};
pub use config::SequencerConfig;
pub use cycle::{Cycle, CycleController, Run};
pub use discovery::{ImportSettings, TestDiscoverer};
pub use error::{SequencerError, SequencerResult};
pub use permission::{PermissionGate, Role};
pub use registry::SequenceRegistry;
pub use sequence::{
    ElementStatus, TestRootNode, TestSequenceContainer, TestSequenceElement,
    TestSequencerProject, TestType,
};
pub use sequencer::Sequencer;
