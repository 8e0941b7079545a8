//! Migration steps and the ordered plan they form.

use std::collections::HashSet;

use semver::Version;

use crate::builder::MigrationBuilder;
use crate::error::{MigrateError, Result};

/// A versioned, named schema change.
///
/// # Example
///
/// ```rust
/// use oxide_migrate::{ColumnSchema, Migration, MigrationBuilder, SqlType};
///
/// pub struct AddContentTypeDescription;
///
/// impl Migration for AddContentTypeDescription {
///     const PRODUCT: &'static str = "oxide-cms";
///     const VERSION: &'static str = "8.1.0";
///     const NAME: &'static str = "add_content_type_description";
///
///     fn up(m: &mut MigrationBuilder) {
///         m.alter()
///             .table("contentType")
///             .add_column(ColumnSchema::new("description", SqlType::Varchar(1000)));
///     }
/// }
/// ```
pub trait Migration {
    /// Product the step belongs to.
    const PRODUCT: &'static str;

    /// Product version that introduced the step, as a semantic version.
    const VERSION: &'static str;

    /// Step name, unique within its version.
    const NAME: &'static str;

    /// Describes the schema change.
    fn up(m: &mut MigrationBuilder);
}

/// A registered step with runtime-accessible metadata.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    /// Owning product.
    pub product: &'static str,
    /// Target version.
    pub version: Version,
    /// Position within the version, in declaration order.
    pub ordinal: usize,
    /// Step name.
    pub name: &'static str,
    /// Function describing the change.
    pub up: fn(&mut MigrationBuilder),
}

impl MigrationStep {
    /// Ledger identifier, `"{version}/{name}"`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.version, self.name)
    }

    /// Runs `up` into a fresh builder.
    #[must_use]
    pub fn build(&self) -> MigrationBuilder {
        let mut builder = MigrationBuilder::new();
        (self.up)(&mut builder);
        builder
    }
}

/// All known steps of one product, kept in ascending (version, ordinal) order.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    product: &'static str,
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new(product: &'static str) -> Self {
        Self {
            product,
            steps: Vec::new(),
        }
    }

    /// Registers a [`Migration`].
    pub fn register<M: Migration>(&mut self) -> Result<&mut Self> {
        if M::PRODUCT != self.product {
            return Err(MigrateError::ProductMismatch {
                step: M::NAME.to_string(),
                expected: self.product.to_string(),
                found: M::PRODUCT.to_string(),
            });
        }
        self.add(M::VERSION, M::NAME, M::up)
    }

    /// Registers a step from its parts.
    pub fn add(
        &mut self,
        version: &str,
        name: &'static str,
        up: fn(&mut MigrationBuilder),
    ) -> Result<&mut Self> {
        let version = Version::parse(version).map_err(|source| MigrateError::InvalidVersion {
            value: version.to_string(),
            source,
        })?;

        let ordinal = self.steps.iter().filter(|s| s.version == version).count();
        let step = MigrationStep {
            product: self.product,
            version,
            ordinal,
            name,
            up,
        };

        let id = step.id();
        if self.steps.iter().any(|s| s.id() == id) {
            return Err(MigrateError::DuplicateStep(id));
        }

        self.steps.push(step);
        self.steps
            .sort_by(|a, b| (&a.version, a.ordinal).cmp(&(&b.version, b.ordinal)));
        Ok(self)
    }

    /// The product this plan migrates.
    #[must_use]
    pub fn product(&self) -> &'static str {
        self.product
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Looks a step up by id (`"8.0.0/create_node_table"`) or bare name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MigrationStep> {
        self.steps
            .iter()
            .find(|s| s.id() == key || s.name == key)
    }

    /// Steps not in `recorded`, in execution order.
    #[must_use]
    pub fn pending(&self, recorded: &HashSet<String>) -> Vec<&MigrationStep> {
        self.steps
            .iter()
            .filter(|s| !recorded.contains(&s.id()))
            .collect()
    }

    /// Version of the last step, i.e. the schema version after a full run.
    #[must_use]
    pub fn target_version(&self) -> Option<&Version> {
        self.steps.last().map(|s| &s.version)
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true when no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut MigrationBuilder) {}

    fn touch(m: &mut MigrationBuilder) {
        m.execute().sql("SELECT 1");
    }

    struct CreateNode;

    impl Migration for CreateNode {
        const PRODUCT: &'static str = "cms";
        const VERSION: &'static str = "8.0.0";
        const NAME: &'static str = "create_node";

        fn up(m: &mut MigrationBuilder) {
            touch(m);
        }
    }

    struct Elsewhere;

    impl Migration for Elsewhere {
        const PRODUCT: &'static str = "forms";
        const VERSION: &'static str = "1.0.0";
        const NAME: &'static str = "init";

        fn up(_: &mut MigrationBuilder) {}
    }

    #[test]
    fn test_steps_sorted_by_version_then_declaration() {
        let mut plan = MigrationPlan::new("cms");
        plan.add("8.1.0", "b", noop).unwrap();
        plan.add("8.0.0", "z", noop).unwrap();
        plan.add("8.0.0", "a", noop).unwrap();
        plan.add("8.0.10", "c", noop).unwrap();

        let ids: Vec<String> = plan.steps().iter().map(MigrationStep::id).collect();
        assert_eq!(ids, vec!["8.0.0/z", "8.0.0/a", "8.0.10/c", "8.1.0/b"]);
        assert_eq!(plan.steps()[1].ordinal, 1);
        assert_eq!(plan.target_version(), Some(&Version::new(8, 1, 0)));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut plan = MigrationPlan::new("cms");
        plan.add("8.0.0", "a", noop).unwrap();
        let err = plan.add("8.0.0", "a", noop).unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateStep(id) if id == "8.0.0/a"));

        // Same name under another version is a different step.
        assert!(plan.add("8.1.0", "a", noop).is_ok());
    }

    #[test]
    fn test_invalid_version_rejected() {
        let mut plan = MigrationPlan::new("cms");
        let err = plan.add("eight", "a", noop).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidVersion { value, .. } if value == "eight"));
    }

    #[test]
    fn test_pending_preserves_order() {
        let mut plan = MigrationPlan::new("cms");
        plan.add("8.0.0", "a", noop).unwrap();
        plan.add("8.0.0", "b", noop).unwrap();
        plan.add("8.1.0", "c", noop).unwrap();

        let recorded: HashSet<String> = ["8.0.0/b".to_string()].into_iter().collect();
        let pending: Vec<String> = plan.pending(&recorded).iter().map(|s| s.id()).collect();
        assert_eq!(pending, vec!["8.0.0/a", "8.1.0/c"]);
    }

    #[test]
    fn test_register_migration() {
        let mut plan = MigrationPlan::new("cms");
        plan.register::<CreateNode>().unwrap();

        let step = plan.get("create_node").unwrap();
        assert_eq!(step.product, "cms");
        assert_eq!(step.build().len(), 1);
        assert!(plan.get("8.0.0/create_node").is_some());

        let err = plan.register::<Elsewhere>().unwrap_err();
        assert!(matches!(err, MigrateError::ProductMismatch { .. }));
    }
}
