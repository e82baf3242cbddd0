pub mod domain;
pub mod filter;
pub mod navigation;
pub mod ports;
pub mod session;

pub use domain::{
    accepted_mime_type, Document, FamilyMember, Identity, NewDocument, Role, User, UserCredentials,
};
pub use filter::{DocumentFilter, FilterOptions};
pub use navigation::{transition, NavEvent, Step, View};
pub use ports::{DatabaseService, PortError, PortResult, StorageService, StoredSession};
pub use session::{NavigationState, SessionContext};
