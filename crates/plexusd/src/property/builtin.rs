//! Properties every plexus process registers at startup.

use tracing::debug;

use super::{
    PropertyDescriptor, PropertyRegistry, PropertyStore, RegistryError, SetterOutcome,
};
use crate::request::ExecContext;
use crate::response::ErrorCode;
use crate::role::ProcessRole;
use crate::set::Assignment;

const SET_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::set");

/// Per-request timeout in milliseconds.
pub const QUERY_TIMEOUT: &str = "query-timeout";
/// Whether slow queries are logged (`on`/`off`).
pub const SLOW_QUERY_LOG: &str = "slow-query-log";
/// Graph used when a request does not name one.
pub const DEFAULT_GRAPH: &str = "default-graph";
/// Identity shared by the SMP group. Read-only.
pub const INSTANCE_ID: &str = "instance-id";
/// Role of the answering process. Read-only.
pub const SMP_ROLE: &str = "smp-role";
/// Server version. Read-only.
pub const VERSION: &str = "version";

/// Default value of [`QUERY_TIMEOUT`].
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

/// Longest accepted [`DEFAULT_GRAPH`] value, in bytes.
pub const MAX_GRAPH_NAME_LEN: usize = 63;

/// Builds the registry of built-in properties.
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if two built-ins share a name.
pub fn registry() -> Result<PropertyRegistry, RegistryError> {
    let mut registry = PropertyRegistry::new();
    let descriptors = [
        PropertyDescriptor::writable(QUERY_TIMEOUT, set_positive_integer),
        PropertyDescriptor::writable(SLOW_QUERY_LOG, set_switch),
        PropertyDescriptor::writable(DEFAULT_GRAPH, set_identifier),
        PropertyDescriptor::read_only(INSTANCE_ID),
        PropertyDescriptor::read_only(SMP_ROLE),
        PropertyDescriptor::read_only(VERSION),
    ];
    for descriptor in descriptors {
        registry.register(descriptor)?;
    }
    Ok(registry)
}

/// Seeds `store` with default and identity values.
pub fn seed_store(store: &mut PropertyStore, instance_id: &str, role: ProcessRole) {
    store.seed(QUERY_TIMEOUT, DEFAULT_QUERY_TIMEOUT_MS.to_string());
    store.seed(SLOW_QUERY_LOG, "off");
    store.seed(DEFAULT_GRAPH, "default");
    store.seed(INSTANCE_ID, instance_id);
    store.seed(SMP_ROLE, role.to_string());
    store.seed(VERSION, env!("CARGO_PKG_VERSION"));
}

/// Reads [`QUERY_TIMEOUT`] from `store`, falling back to the default.
#[must_use]
pub fn query_timeout_ms(store: &PropertyStore) -> u64 {
    store
        .get(QUERY_TIMEOUT)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS)
}

/// Setter accepting integers greater than zero.
pub fn set_positive_integer(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    assignment: &Assignment,
) -> SetterOutcome {
    let raw = ctx.span(assignment.value_span());
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => store_value(descriptor, ctx, value.to_string()),
        _ => reject(descriptor, ctx, raw, "expected a positive integer"),
    }
}

/// Setter accepting `on` or `off`, case-insensitively.
pub fn set_switch(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    assignment: &Assignment,
) -> SetterOutcome {
    let raw = ctx.span(assignment.value_span());
    if raw.eq_ignore_ascii_case("on") {
        store_value(descriptor, ctx, "on".to_owned())
    } else if raw.eq_ignore_ascii_case("off") {
        store_value(descriptor, ctx, "off".to_owned())
    } else {
        reject(descriptor, ctx, raw, "expected 'on' or 'off'")
    }
}

/// Setter accepting identifiers of ASCII letters, digits and underscores.
pub fn set_identifier(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    assignment: &Assignment,
) -> SetterOutcome {
    let raw = ctx.span(assignment.value_span());
    let valid = !raw.is_empty()
        && raw.len() <= MAX_GRAPH_NAME_LEN
        && raw
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        && !raw.starts_with(|ch: char| ch.is_ascii_digit());
    if valid {
        store_value(descriptor, ctx, raw.to_owned())
    } else {
        reject(
            descriptor,
            ctx,
            raw,
            "expected an identifier of at most 63 bytes",
        )
    }
}

fn store_value(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    value: String,
) -> SetterOutcome {
    debug!(
        target: SET_TARGET,
        request = %ctx.request(),
        property = descriptor.name(),
        value = %value,
        "property assigned"
    );
    match ctx.store().set(descriptor.name(), value) {
        Ok(_) => SetterOutcome::Continue,
        Err(error) => SetterOutcome::Fail(error),
    }
}

fn reject(
    descriptor: &PropertyDescriptor,
    ctx: &mut ExecContext<'_>,
    raw: &str,
    expectation: &str,
) -> SetterOutcome {
    ctx.report_error(
        ErrorCode::InvalidValue,
        format!(
            "invalid value '{raw}' for {}: {expectation}",
            descriptor.name()
        ),
    );
    SetterOutcome::HandledStop
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_marks_identity_read_only() {
        let registry = registry().expect("built-in registry");
        for name in [INSTANCE_ID, SMP_ROLE, VERSION] {
            let descriptor = registry.lookup_by_name(name).expect("registered");
            assert!(descriptor.is_read_only(), "{name} should be read-only");
        }
        for name in [QUERY_TIMEOUT, SLOW_QUERY_LOG, DEFAULT_GRAPH] {
            let descriptor = registry.lookup_by_name(name).expect("registered");
            assert!(!descriptor.is_read_only(), "{name} should be writable");
        }
    }

    #[test]
    fn builtins_go_through_duplicate_checks() {
        let mut registry = registry().expect("built-in registry");
        assert_eq!(registry.len(), 6);
        let error = registry
            .register(PropertyDescriptor::read_only(QUERY_TIMEOUT))
            .expect_err("built-in names are taken");
        assert_eq!(
            error,
            RegistryError::Duplicate {
                name: QUERY_TIMEOUT.to_owned()
            }
        );
    }

    #[test]
    fn seeded_store_answers_every_builtin() {
        let registry = registry().expect("built-in registry");
        let mut store = PropertyStore::with_capacity(0);
        seed_store(&mut store, "nodeA", ProcessRole::Leader);
        for name in registry.names() {
            assert!(store.get(name).is_some(), "{name} has no seeded value");
        }
        assert_eq!(store.get(SMP_ROLE), Some("leader"));
        assert_eq!(query_timeout_ms(&store), DEFAULT_QUERY_TIMEOUT_MS);
    }
}
