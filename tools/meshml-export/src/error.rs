//! Fatal export faults
//!
//! Anything in here aborts the export of the whole scene. Non-fatal conditions
//! (empty meshes, degenerate UV derivatives) are logged and skipped instead.

/// A fault that leaves the scene in a state that cannot be exported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    /// Two joint nodes share a name; joint identity is keyed by name
    #[error("duplicate joint name '{0}'")]
    DuplicateJoint(String),

    /// A skin binds a vertex to a node that is not a discovered joint
    #[error("mesh '{mesh}' binds to unknown joint '{joint}'")]
    UnknownJoint { mesh: String, joint: String },

    /// A vertex ended up with no usable influence after pruning
    #[error("vertex {vertex} of mesh '{mesh}' resolves to zero total skin weight")]
    ZeroWeight { mesh: String, vertex: usize },

    /// A kept joint's parent did not survive pruning
    #[error("joint '{joint}' references parent '{parent}' which is not in the joint set")]
    MissingParent { joint: String, parent: String },

    /// The parent links do not form a tree
    #[error("joint hierarchy contains a cycle through '{0}'")]
    JointCycle(String),

    /// Host mesh data indexes outside its own arrays
    #[error("mesh '{mesh}' is malformed: {reason}")]
    InvalidMesh { mesh: String, reason: String },
}
