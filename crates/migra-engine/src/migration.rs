//! Migration entry point

use crate::bundle::ContractsBundle;
use crate::context::MigrationContext;
use crate::error::MigrationResult;
use migra_registry::Roots;

/// A named, two-phase migration
///
/// `prepare` deploys and wires contracts and must be safe to run again:
/// aliased targets are reused on the next call. `enact` derives the roots
/// to publish from the bundle `prepare` returned; the runner commits them.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Stable name, used as the migration log key
    fn name(&self) -> &str;

    /// Deploy and wire contracts
    async fn prepare(&self, cx: &mut MigrationContext<'_>) -> MigrationResult<ContractsBundle>;

    /// Roots to publish for `bundle`
    async fn enact(
        &self,
        cx: &mut MigrationContext<'_>,
        bundle: &ContractsBundle,
    ) -> MigrationResult<Roots>;
}
