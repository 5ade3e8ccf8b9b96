pub mod enums;
pub mod resident;
pub mod census;
pub mod vaccination;
pub mod antibiotic;
pub mod infection;

pub use enums::*;
pub use resident::*;
pub use census::*;
pub use vaccination::*;
pub use antibiotic::*;
pub use infection::*;

use uuid::Uuid;

/// Generate a prefixed record id, e.g. `vax_9f8c…`.
pub fn make_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_carries_prefix() {
        let id = make_id("abt");
        assert!(id.starts_with("abt_"));
        assert!(id.len() > 10);
    }

    #[test]
    fn make_id_unique() {
        assert_ne!(make_id("vax"), make_id("vax"));
    }
}
