//! Interface Tests

use super::*;
use crate::binding::Binding;
use crate::convention::DefaultCall;
use crate::test_support::{fixture_module, CountingLoader};
use crate::types::ValueType;

crate::interface! {
    /// Everything the counting loader's fixture exports
    pub struct FixtureApi {
        fn add(a: i32, b: i32) -> i32;
        extern "C" fn noop();
        fn noop_count() -> i32;
        fn scale(value: f64, factor: f64) -> f64;
    }
}

crate::interface! {
    struct Renamed {
        fn plus(a: i32, b: i32) -> i32 as "add";
        extern "cdecl" fn tick() as "noop";
    }
}

crate::interface! {
    struct Partial {
        fn add(a: i32, b: i32) -> i32;
        fn first_missing();
        fn noop();
        fn second_missing(x: u64) -> u64;
    }
}

crate::interface! {
    struct Empty {}
}

#[test]
fn test_bind_and_call_every_entry() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let api = unsafe { FixtureApi::bind(&module) }.unwrap();

    assert_eq!(api.add(2, 3), Ok(5));
    assert_eq!(api.scale(1.5, 4.0), Ok(6.0));

    let before = api.noop_count().unwrap();
    api.noop().unwrap();
    assert!(api.noop_count().unwrap() > before);
}

#[test]
fn test_entries_bound_in_declaration_order() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let _api = unsafe { Partial::bind(&module) }.unwrap();

    assert_eq!(
        loader.lookups(),
        vec!["add", "first_missing", "noop", "second_missing"]
    );
}

#[test]
fn test_lenient_policy_keeps_absent_bindings() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let api = unsafe { Partial::bind_with(&module, BindPolicy::Lenient) }.unwrap();

    assert!(api.add.is_resolved());
    assert!(!api.first_missing.is_resolved());
    assert_eq!(api.add(1, 1), Ok(2));
    assert_eq!(
        api.second_missing(7),
        Err(BindError::SymbolAbsent("second_missing".to_string()))
    );
}

#[test]
fn test_strict_policy_lists_every_absent_name() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let err = unsafe { Partial::bind_with(&module, BindPolicy::Strict) }.unwrap_err();

    assert_eq!(
        err,
        BindError::MissingSymbols {
            interface: "Partial".to_string(),
            names: vec!["first_missing".to_string(), "second_missing".to_string()],
        }
    );
    // Every entry was attempted before failing.
    assert_eq!(loader.lookups().len(), 4);
}

#[test]
fn test_generated_interface_debug_lists_bindings() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let api = unsafe { Partial::bind(&module) }.unwrap();

    let text = format!("{:?}", api);
    assert!(text.starts_with("Partial {"), "unexpected: {}", text);
    assert!(text.contains("name: \"first_missing\""));
    assert!(text.contains("resolved: false"));

    let bound = unsafe { FixtureApi::bind_with(&module, BindPolicy::Strict) };
    assert!(format!("{:?}", bound).starts_with("Ok(FixtureApi {"));
}

#[test]
fn test_renamed_entries_use_export_name() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let api = unsafe { Renamed::bind_with(&module, BindPolicy::Strict) }.unwrap();

    assert_eq!(api.plus.name(), "add");
    assert_eq!(api.tick.name(), "noop");
    assert_eq!(api.plus(20, 22), Ok(42));
    api.tick().unwrap();
}

#[test]
fn test_module_bind_generic_entry_point() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let api: FixtureApi<'_> = unsafe { module.bind() }.unwrap();
    assert_eq!(api.add(-1, 1), Ok(0));
}

#[test]
fn test_interfaces_share_field_types() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let fixture = unsafe { FixtureApi::bind(&module) }.unwrap();
    let renamed = unsafe { Renamed::bind(&module) }.unwrap();

    // Same signature and convention: the fields are the same type.
    let adders: Vec<Binding<'_, fn(i32, i32) -> i32, DefaultCall>> =
        vec![fixture.add.clone(), renamed.plus.clone()];
    for adder in &adders {
        assert_eq!(adder.call((3, 4)), Ok(7));
    }
}

#[test]
fn test_empty_interface_binds_without_lookups() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);
    let _empty = unsafe { Empty::bind_with(&module, BindPolicy::Strict) }.unwrap();

    assert!(Empty::descriptor().is_empty());
    assert!(loader.lookups().is_empty());
}

#[test]
fn test_generated_descriptor() {
    let descriptor = Renamed::descriptor();
    assert_eq!(descriptor.name(), "Renamed");
    assert_eq!(descriptor.len(), 2);

    let plus = &descriptor.entries()[0];
    assert_eq!(plus.field, "plus");
    assert_eq!(plus.symbol, "add");
    assert_eq!(plus.convention, CallingConvention::Default);
    assert_eq!(plus.signature.params, vec![ValueType::I32, ValueType::I32]);

    let tick = &descriptor.entries()[1];
    assert_eq!(tick.convention, CallingConvention::C);
    assert_eq!(tick.signature.returns, ValueType::Void);

    assert_eq!(
        <FixtureApi<'_> as Interface<'_>>::descriptor(),
        FixtureApi::descriptor()
    );
}

#[test]
fn test_runtime_descriptor_resolution() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);

    let resolved = Partial::descriptor()
        .resolve(&module, BindPolicy::Lenient)
        .unwrap();
    assert_eq!(resolved.name(), "Partial");
    assert_eq!(resolved.len(), 4);
    assert!(resolved.get("add").unwrap().is_resolved());
    assert!(resolved.get("nonexistent_field").is_none());
    assert_eq!(resolved.missing(), vec!["first_missing", "second_missing"]);

    let fields: Vec<&str> = resolved.iter().map(|b| b.field.as_str()).collect();
    assert_eq!(fields, vec!["add", "first_missing", "noop", "second_missing"]);

    let strict = Partial::descriptor().resolve(&module, BindPolicy::Strict);
    assert!(matches!(strict, Err(BindError::MissingSymbols { .. })));
}

#[test]
fn test_runtime_addresses_match_typed_bindings() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);

    let resolved = FixtureApi::descriptor()
        .resolve(&module, BindPolicy::Strict)
        .unwrap();
    assert_eq!(
        resolved.get("add").unwrap().address,
        module.resolve_address("add")
    );
}

#[cfg(not(target_arch = "x86"))]
#[test]
fn test_unsupported_convention_fails_before_lookup() {
    let loader = CountingLoader::with_fixture_exports();
    let module = fixture_module(&loader);

    let descriptor = InterfaceDescriptor::new("Win32").with_entry(EntryDescriptor::new(
        "add",
        "add",
        SignatureInfo::new(ValueType::I32, vec![ValueType::I32, ValueType::I32]),
        CallingConvention::Stdcall,
    ));

    assert!(matches!(
        descriptor.validate(),
        Err(BindError::UnsupportedConvention(_))
    ));
    assert!(matches!(
        descriptor.resolve(&module, BindPolicy::Lenient),
        Err(BindError::UnsupportedConvention(_))
    ));
    assert!(loader.lookups().is_empty());
}
