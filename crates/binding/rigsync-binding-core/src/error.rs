use thiserror::Error;

/// Configuration errors raised while turning binding messages into bindings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("multi-binding children cannot themselves be multi-bindings")]
    NestedMultiBinding,
    #[error("multi-binding has no children")]
    EmptyMultiBinding,
    #[error("multi-binding offsets belong on its children")]
    MultiBindingOffset,
    #[error("rig bone binding has an empty rig name")]
    EmptyRigName,
    #[error("offset rotation {0:?} is not a valid quaternion")]
    InvalidRotation([f32; 4]),
    #[error("non-finite value in field '{0}'")]
    NonFinite(&'static str),
}
