/// A type whose behavior is driven by a replaceable configuration document.
pub trait ConfigAcceptor {
    type Config;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the configuration is rejected, in which case
    /// the previous configuration stays in effect.
    fn set_config(&mut self, config: Self::Config) -> Result<(), Self::Error>;

    /// Returns the configuration in effect.
    fn config(&self) -> &Self::Config;

    /// Reverts to the default configuration and returns the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the default configuration is rejected.
    fn unset_config(&mut self) -> Result<Self::Config, Self::Error>;

    /// Returns a configuration listing every recognized option at its default.
    fn valid_config(&self) -> Self::Config;
}
