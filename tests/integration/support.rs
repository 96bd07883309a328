//! Shared fakes and fixtures.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tjoy_sequencer::discovery::{DiscoveredTest, DiscoveryResponse, DiscoveryService};
use tjoy_sequencer::permission::StaticRole;
use tjoy_sequencer::{
    PermissionGate, Role, SequenceCodec, Sequencer, SequencerResult, TestSequenceContainer,
    TestSequenceElement, TestSequencerProject, TestType,
};

/// Discovery service that reports one test per configured name.
pub struct NamedTests(pub Vec<&'static str>);

#[async_trait]
impl DiscoveryService for NamedTests {
    async fn discover(
        &self,
        _kind: TestType,
        path: &Path,
        _import_as_one_ref: bool,
    ) -> SequencerResult<DiscoveryResponse> {
        Ok(DiscoveryResponse {
            response: self
                .0
                .iter()
                .map(|name| DiscoveredTest {
                    test_name: name.to_string(),
                    path: path.to_path_buf(),
                })
                .collect(),
            ..Default::default()
        })
    }
}

pub fn sequencer(role: Role) -> Sequencer {
    Sequencer::new(
        Arc::new(NamedTests(vec!["test_one", "test_two"])),
        PermissionGate::new(Arc::new(StaticRole(role))),
    )
}

/// Encoded sequence file named `name` holding one pytest element per test.
pub fn sequence_file(name: &str, tests: &[&str]) -> String {
    let elements = tests
        .iter()
        .map(|t| TestSequenceElement::new(*t, format!("tests/{t}.py"), TestType::Pytest))
        .collect();
    let container = TestSequenceContainer::with_elements(TestSequencerProject::new(name), elements)
        .expect("container");
    SequenceCodec::default()
        .encode(&container)
        .expect("encode")
}
