// Docker-backed dependency: container lifecycle and readiness probing

pub mod container;
pub mod readiness;

pub use container::{ContainerState, DockerDependency};
