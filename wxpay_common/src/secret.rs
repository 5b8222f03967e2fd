use std::{
    fmt,
    fmt::{Debug, Display},
};

use zeroize::Zeroize;

/// A wrapper for key material (API keys, symmetric keys) that never prints its contents and wipes them when dropped.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default + Zeroize
{
    value: T,
}

impl<T: Clone + Default + Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default + Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl<T: Clone + Default + Zeroize> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default + Zeroize> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_are_redacted() {
        let key = Secret::new("an-apiv3-key".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(key.reveal(), "an-apiv3-key");
    }
}
