use datastore_macros::entity;
use std::fmt;

#[entity(debug = false)]
#[derive(Clone)]
struct Secret {
    id: Option<String>,
    token: String,
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("id", &self.id).finish()
    }
}

fn main() {
    let secret = Secret {
        id: Some("s1".into()),
        token: "hidden".into(),
    };
    assert!(!format!("{:?}", secret.clone()).contains("hidden"));
}
