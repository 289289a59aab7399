//! Repository boundary resolution for grove
//!
//! Maps request paths under a serving root onto git repositories, decides
//! from permission bits what may be disclosed, and classifies what each
//! request asks for. Repository content is read through [`ContentProvider`].

pub mod error;
pub mod intent;
pub mod permission;
pub mod provider;
pub mod request;
pub mod resolver;

pub use error::{Error, Result};
pub use intent::{classify, substring_dispatch, Classified, Dispatch, Intent};
pub use permission::{Entry, Gate, Threshold};
pub use provider::{git_user, Commit, ContentProvider, GitCli};
pub use request::{authorize_delegate, RequestPath};
pub use resolver::{Resolution, Resolver, Status, MARKER};
