use redkite_domain::{RedkiteError, Result};

/// How many items a fetch may add
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    /// At most this many
    Limited(usize),
    /// Everything that is left
    Unbounded,
}

impl Amount {
    pub fn is_zero(self) -> bool {
        matches!(self, Self::Limited(0))
    }

    /// How many of `available` items fit
    pub fn take_count(self, available: usize) -> usize {
        match self {
            Self::Limited(n) => n.min(available),
            Self::Unbounded => available,
        }
    }

    pub(crate) fn minus(self, used: usize) -> Self {
        match self {
            Self::Limited(n) => Self::Limited(n.saturating_sub(used)),
            Self::Unbounded => Self::Unbounded,
        }
    }
}

impl From<usize> for Amount {
    fn from(n: usize) -> Self {
        Self::Limited(n)
    }
}

impl TryFrom<f64> for Amount {
    type Error = RedkiteError;

    /// `inf` means "everything"; negative amounts fetch nothing
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn try_from(value: f64) -> Result<Self> {
        if value.is_nan() {
            return Err(RedkiteError::InvalidArgument(
                "Failed to fetch Listing. (`amount` parameter was missing or invalid)".into(),
            ));
        }
        if value.is_infinite() && value.is_sign_positive() {
            return Ok(Self::Unbounded);
        }
        if value <= 0.0 {
            return Ok(Self::Limited(0));
        }
        Ok(Self::Limited(value.floor() as usize))
    }
}

/// Options for [`super::Listing::fetch_more`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Required; `None` is rejected
    pub amount: Option<Amount>,
    /// When false the returned listing holds only the newly fetched items
    pub append: bool,
    /// Expand deferred subtrees one level only, without nested replies
    pub skip_replies: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { amount: None, append: true, skip_replies: false }
    }
}

impl FetchOptions {
    pub fn new(amount: usize) -> Self {
        Self { amount: Some(Amount::Limited(amount)), ..Self::default() }
    }

    /// Fetch until the listing is finished
    pub fn all() -> Self {
        Self { amount: Some(Amount::Unbounded), ..Self::default() }
    }

    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn with_skip_replies(mut self, skip_replies: bool) -> Self {
        self.skip_replies = skip_replies;
        self
    }

    /// Same options for the recursive steps of one fetch
    pub(crate) fn appending(self) -> Self {
        Self { append: true, ..self }
    }
}

impl From<usize> for FetchOptions {
    fn from(amount: usize) -> Self {
        Self::new(amount)
    }
}

impl From<Amount> for FetchOptions {
    fn from(amount: Amount) -> Self {
        Self { amount: Some(amount), ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_amounts() {
        assert_eq!(Amount::try_from(f64::INFINITY).unwrap(), Amount::Unbounded);
        assert_eq!(Amount::try_from(-3.0).unwrap(), Amount::Limited(0));
        assert_eq!(Amount::try_from(7.9).unwrap(), Amount::Limited(7));
        assert!(Amount::try_from(f64::NAN).is_err());
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Amount::Limited(3).minus(10), Amount::Limited(0));
        assert_eq!(Amount::Unbounded.minus(10), Amount::Unbounded);
        assert_eq!(Amount::Limited(3).take_count(10), 3);
        assert_eq!(Amount::Unbounded.take_count(10), 10);
    }

    #[test]
    fn defaults_append() {
        let options = FetchOptions::default();
        assert!(options.append);
        assert!(options.amount.is_none());
        assert_eq!(FetchOptions::from(5).amount, Some(Amount::Limited(5)));
    }
}
