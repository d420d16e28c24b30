pub mod customer;
pub mod follow_up;
pub mod hierarchy;
pub mod interaction;
pub mod loan;
pub mod payment;
pub mod user;

/// `PREFIX-` followed by eight uppercase hex digits of a fresh v4 uuid.
pub fn reference(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    #[test]
    fn references_are_prefixed_hex() {
        let reference = super::reference("LN");
        assert_eq!(reference.len(), 11);
        assert!(reference.starts_with("LN-"));
        assert!(
            reference[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }
}
