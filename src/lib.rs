//! Disposable NiFi instances for flow integration tests.
//!
//! A test describes a NiFi binary distribution and a flow definition,
//! optionally rewrites the flow (point a source at a mock server, swap a
//! processor class for a mock), and gets one single-use instance that is
//! installed, started and finally stopped and cleaned up.
//!
//! - **Layout** - the fixed placeholder home and the paths derived from it
//! - **Staging** - extraction, linking, flow installation and cleanup
//! - **Edit pipeline** - ordered, composable flow definition changes
//! - **Lifecycle** - the state machine guarding install/start/stop
//! - **Runtime boundary** - the launcher capability the lifecycle drives
//!
//! # Architecture
//!
//! ```text
//! TestInstanceBuilder ──build()──> TestInstance (CREATED)
//!     │
//!     ├── install()  remove stale nifi-* ─> edit flow in scratch dir
//!     │              ─> extract archive ─> locate nifi-* ─> link entries
//!     │              ─> gzip flow into conf/flow.xml.gz
//!     ├── start()    check lib/bootstrap ─> RuntimeLauncher::launch
//!     │              ─> Readiness::wait
//!     └── stop_and_cleanup()  RunningRuntime::shutdown ─> sweep root
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nifi_testbed::{CommandLauncher, FlowEditor, TestInstance};
//!
//! let mocks = FlowEditor::builder()
//!     .set_single_processor_property("GetHTTP", "URL", "http://localhost:12345")?
//!     .build()?;
//!
//! let mut nifi = TestInstance::builder()
//!     .archive("../nifi-1.6.0-bin.zip")?
//!     .flow_definition("tests/resources/flow.xml")?
//!     .edit_flow(mocks)?
//!     .launcher(CommandLauncher::new("bin/nifi.sh").args(["run"]))?
//!     .build()?;
//!
//! nifi.install()?;
//! nifi.start()?;
//! nifi.stop_and_cleanup()?;
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod instance;
pub mod layout;
pub mod runtime;
pub mod stage;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::TestbedConfig;
pub use edit::{DocumentChange, FlowEditor, FlowEditorBuilder};
pub use error::{ConfigError, EditError, InstanceError, PipelineError, StagingError, TransitionError};
pub use instance::{TestInstance, TestInstanceBuilder};
pub use layout::HomeLayout;
pub use runtime::{CommandLauncher, Readiness, RunningRuntime, RuntimeEnvironment, RuntimeLauncher};
pub use state::State;
pub use xmltree::Element;
