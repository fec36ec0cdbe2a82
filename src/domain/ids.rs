use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Role used both to gate steps and to authorize users
    RoleId
);
id_type!(
    /// Acting user
    UserId
);
id_type!(
    /// Parent case (job / work order) that owns documents
    CaseId
);
id_type!(
    /// Case category, e.g. a job type
    CategoryId
);
id_type!(DocumentTypeId);
id_type!(DocumentId);
id_type!(
    /// Live approval cursor row
    ApprovalStepId
);
