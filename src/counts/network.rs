use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The networks with a built-in count provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    Facebook,
    GooglePlus,
    Twitter,
}

impl Network {
    /// The identifier used in requests and in the combined result, e.g. `googleplus`.
    #[must_use]
    pub fn id(self) -> &'static str {
        self.into()
    }

    /// All built-in networks, in identifier order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}
