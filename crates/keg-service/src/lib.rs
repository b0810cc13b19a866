//! Service descriptors for installed packages.
//!
//! [`ServiceDescriptorBuilder`] turns a formula's
//! [`ServiceTemplate`](keg_resource::ServiceTemplate) into a concrete
//! [`ServiceDescriptor`] without touching the filesystem or the process
//! environment. The descriptor can be rendered as JSON, a systemd unit or a
//! launchd property list and handed to whatever registers services on the host.

mod builder;
mod descriptor;
mod error;
mod render;

pub use builder::ServiceDescriptorBuilder;
pub use descriptor::ServiceDescriptor;
pub use error::{Result, ServiceError};
