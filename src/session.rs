use serde::{Deserialize, Serialize};

/// Identity of the signed-in user, passed explicitly into every store
/// operation. Resolving credentials is the identity provider's job.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
}

impl Session {
    pub fn new(uid: &str, email: Option<String>) -> Self {
        Self {
            uid: uid.to_string(),
            email,
        }
    }
}
