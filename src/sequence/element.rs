use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

static ELEMENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique element identifier.
pub fn generate_element_id() -> String {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = ELEMENT_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{:x}-{}-{}", timestamp_ms, std::process::id(), seq)
}

/// Kind of test an element executes. Also selects the discovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// A plain Python script executed as a whole.
    Python,
    /// Pytest or unittest test cases.
    Pytest,
    /// Robot Framework test cases.
    #[serde(rename = "robotframework", alias = "robot")]
    RobotFramework,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Python => "python",
            TestType::Pytest => "pytest",
            TestType::RobotFramework => "robotframework",
        }
    }

    /// Strategy used when only the file name is known.
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("robot") => TestType::RobotFramework,
            _ => TestType::Pytest,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(TestType::Python),
            "pytest" | "unittest" => Ok(TestType::Pytest),
            "robotframework" | "robot" | "robot-framework" => Ok(TestType::RobotFramework),
            other => Err(format!("unknown test type: {other}")),
        }
    }
}

/// Execution status of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "pass", alias = "passed")]
    Passed,
    #[serde(rename = "fail", alias = "failed")]
    Failed,
}

impl ElementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementStatus::Pending => "pending",
            ElementStatus::Running => "running",
            ElementStatus::Passed => "pass",
            ElementStatus::Failed => "fail",
        }
    }

    /// Whether execution of the element has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ElementStatus::Passed | ElementStatus::Failed)
    }
}

impl fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A test leaf of a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSequenceElement {
    pub id: String,
    /// Display name.
    pub test_name: String,
    pub path: PathBuf,
    pub test_type: TestType,
    /// Extra invocation arguments passed to the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub status: ElementStatus,
    /// Seconds the last execution took.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<f64>,
    #[serde(default)]
    pub is_saved_to_cloud: bool,
    #[serde(default)]
    pub export_to_cloud: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestSequenceElement {
    /// Create a pending test element with a fresh identifier.
    pub fn new(test_name: impl Into<String>, path: impl Into<PathBuf>, test_type: TestType) -> Self {
        Self {
            id: generate_element_id(),
            test_name: test_name.into(),
            path: path.into(),
            test_type,
            args: None,
            status: ElementStatus::Pending,
            completion_time: None,
            is_saved_to_cloud: false,
            export_to_cloud: true,
            error: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// Forget the outcome of a previous execution.
    pub fn reset(&mut self) {
        self.status = ElementStatus::Pending;
        self.completion_time = None;
        self.is_saved_to_cloud = false;
        self.error = None;
    }
}
