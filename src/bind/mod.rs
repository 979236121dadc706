//! Tag-driven binding of query strings and form bodies into structs.
//!
//! A [`Binder`] walks the fields of a [`Bindable`] target in declaration
//! order, looks up each field's tag for the binder's namespace in a
//! [`Values`] source, and converts the first value to the field's kind.
//!
//! | Step | Rule |
//! |------|------|
//! | tag  | absent, empty or `"-"` → field skipped |
//! | key  | absent, or first value is `""` → field keeps its current value |
//! | kind | string, signed/unsigned integers, floats and bool are converted; anything else is [`BindError::UnsupportedFieldKind`] |
//!
//! Binding stops at the first error. Fields assigned before it stay assigned.
//!
//! Field descriptors are produced at compile time with [`bindable!`](crate::bindable):
//!
//! ```
//! use httpctx::bindable;
//! use httpctx::bind::{Binder, Values};
//!
//! #[derive(Debug, Default)]
//! struct Search {
//!     term: String,
//!     page: u32,
//!     exact: bool,
//! }
//!
//! bindable!(Search {
//!     term [form = "q", url = "q"],
//!     page [url = "p"],
//!     exact [url = "exact"],
//! });
//!
//! let mut search = Search::default();
//! Binder::query()
//!     .bind(&mut search, &Values::parse("q=rust&p=3&exact=t"))
//!     .unwrap();
//! assert_eq!(search.term, "rust");
//! assert_eq!(search.page, 3);
//! assert!(search.exact);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;
use tracing::trace;

pub mod values;

pub use values::Values;

/// Tag value that excludes a field from binding.
pub const SKIP_TAG: &str = "-";

/// Tag namespace read by [`Binder::form`].
pub const FORM_TAG: &str = "form";

/// Tag namespace read by [`Binder::query`].
pub const QUERY_TAG: &str = "url";

/// The declared kind of a bindable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Bool,
    /// A kind the binder cannot convert into, named for error messages.
    Other(&'static str),
}

impl FieldKind {
    /// Returns the kind's name as it appears in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::U128 => "u128",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw string could not be converted.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error(transparent)]
    Int(#[from] ParseIntError),

    #[error(transparent)]
    Float(#[from] ParseFloatError),

    #[error("unsigned value must not carry a sign")]
    Sign,

    #[error("invalid boolean literal")]
    Bool,

    #[error("value out of range")]
    Range,
}

/// Errors returned by [`Binder::bind`].
#[derive(Debug, Error)]
pub enum BindError {
    #[error("binding target is null")]
    InvalidTarget,

    #[error("field `{field}` has unsupported kind `{kind}`")]
    UnsupportedFieldKind {
        field: &'static str,
        kind: &'static str,
    },

    #[error("field `{field}`: cannot convert {raw:?} to {kind}: {source}")]
    Conversion {
        field: &'static str,
        raw: String,
        kind: FieldKind,
        #[source]
        source: ParseFailure,
    },
}

/// A mutable handle to one field, tagged with its kind.
#[derive(Debug)]
pub enum Slot<'a> {
    Str(&'a mut String),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    I128(&'a mut i128),
    Isize(&'a mut isize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    U128(&'a mut u128),
    Usize(&'a mut usize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Bool(&'a mut bool),
    /// Field of a kind the binder does not convert into.
    Unsupported(&'static str),
}

impl Slot<'_> {
    /// Returns the kind of the field behind this slot.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Str(_) => FieldKind::String,
            Self::I8(_) => FieldKind::I8,
            Self::I16(_) => FieldKind::I16,
            Self::I32(_) => FieldKind::I32,
            Self::I64(_) => FieldKind::I64,
            Self::I128(_) => FieldKind::I128,
            Self::Isize(_) => FieldKind::Isize,
            Self::U8(_) => FieldKind::U8,
            Self::U16(_) => FieldKind::U16,
            Self::U32(_) => FieldKind::U32,
            Self::U64(_) => FieldKind::U64,
            Self::U128(_) => FieldKind::U128,
            Self::Usize(_) => FieldKind::Usize,
            Self::F32(_) => FieldKind::F32,
            Self::F64(_) => FieldKind::F64,
            Self::Bool(_) => FieldKind::Bool,
            Self::Unsupported(name) => FieldKind::Other(*name),
        }
    }
}

/// Types that can appear as a field of a [`Bindable`] struct.
///
/// Implemented for `String`, every integer and float primitive and `bool`.
/// Collections and `Option` report themselves as unsupported. Implement this
/// for your own field types by returning [`Slot::Unsupported`] (or a slot
/// over an inner primitive for newtypes).
pub trait FieldSlot {
    /// Returns a mutable handle to `self`.
    fn slot(&mut self) -> Slot<'_>;
}

macro_rules! primitive_slot {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldSlot for $ty {
                fn slot(&mut self) -> Slot<'_> {
                    Slot::$variant(self)
                }
            }
        )*
    };
}

primitive_slot! {
    String => Str,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    bool => Bool,
}

impl<T> FieldSlot for Vec<T> {
    fn slot(&mut self) -> Slot<'_> {
        Slot::Unsupported("sequence")
    }
}

impl<T> FieldSlot for Option<T> {
    fn slot(&mut self) -> Slot<'_> {
        Slot::Unsupported("option")
    }
}

impl<K, V, S> FieldSlot for HashMap<K, V, S> {
    fn slot(&mut self) -> Slot<'_> {
        Slot::Unsupported("map")
    }
}

impl<K, V> FieldSlot for BTreeMap<K, V> {
    fn slot(&mut self) -> Slot<'_> {
        Slot::Unsupported("map")
    }
}

/// One field descriptor: name, binding tags per namespace, and its slot.
#[derive(Debug)]
pub struct Field<'a> {
    name: &'static str,
    tags: &'static [(&'static str, &'static str)],
    slot: Slot<'a>,
}

impl<'a> Field<'a> {
    /// Creates a descriptor. `tags` holds `(namespace, tag)` pairs.
    pub fn new(
        name: &'static str,
        tags: &'static [(&'static str, &'static str)],
        slot: Slot<'a>,
    ) -> Self {
        Self { name, tags, slot }
    }

    /// Returns the field's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the field's tag under `namespace`, if it declares one.
    pub fn tag(&self, namespace: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, tag)| *tag)
    }

    /// Returns the field's declared kind.
    pub fn kind(&self) -> FieldKind {
        self.slot.kind()
    }
}

/// A structure whose fields can be populated by a [`Binder`].
///
/// Usually implemented with [`bindable!`](crate::bindable). A hand-written
/// implementation returns one [`Field`] per struct field, in declaration order.
pub trait Bindable {
    /// Enumerates the target's fields in declaration order.
    ///
    /// # Errors
    ///
    /// [`BindError::InvalidTarget`] when the handle points at nothing.
    fn fields(&mut self) -> Result<Vec<Field<'_>>, BindError>;
}

impl<T: Bindable + ?Sized> Bindable for Box<T> {
    fn fields(&mut self) -> Result<Vec<Field<'_>>, BindError> {
        (**self).fields()
    }
}

/// `None` is a null handle.
impl<T: Bindable> Bindable for Option<T> {
    fn fields(&mut self) -> Result<Vec<Field<'_>>, BindError> {
        match self {
            Some(target) => target.fields(),
            None => Err(BindError::InvalidTarget),
        }
    }
}

/// Implements [`Bindable`](crate::bind::Bindable) for a struct.
///
/// List each field in declaration order, optionally followed by
/// `[namespace = "tag", ...]`. Fields without a tag for the active namespace
/// are never bound.
///
/// ```
/// use httpctx::bindable;
///
/// #[derive(Default)]
/// struct Login {
///     user: String,
///     remember: bool,
///     internal: u8,
/// }
///
/// bindable!(Login {
///     user [form = "username", url = "u"],
///     remember [form = "remember"],
///     internal [form = "-"],
/// });
/// ```
#[macro_export]
macro_rules! bindable {
    ($ty:ident { $( $field:ident $( [ $( $ns:ident = $tag:literal ),* $(,)? ] )? ),* $(,)? }) => {
        impl $crate::bind::Bindable for $ty {
            fn fields(
                &mut self,
            ) -> ::std::result::Result<
                ::std::vec::Vec<$crate::bind::Field<'_>>,
                $crate::bind::BindError,
            > {
                ::std::result::Result::Ok(::std::vec![
                    $(
                        $crate::bind::Field::new(
                            ::std::stringify!($field),
                            &[ $( $( (::std::stringify!($ns), $tag) ),* )? ],
                            $crate::bind::FieldSlot::slot(&mut self.$field),
                        ),
                    )*
                ])
            }
        }
    };
}

/// Populates [`Bindable`] targets from a [`Values`] source.
///
/// The binder only remembers which tag namespace to read, so it is `Copy`
/// and can be built wherever it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binder {
    tag: &'static str,
}

impl Binder {
    /// Creates a binder reading tags under `tag`.
    pub const fn new(tag: &'static str) -> Self {
        Self { tag }
    }

    /// Binder for decoded form bodies (`form` tags).
    pub const fn form() -> Self {
        Self::new(FORM_TAG)
    }

    /// Binder for URL query strings (`url` tags).
    pub const fn query() -> Self {
        Self::new(QUERY_TAG)
    }

    /// Returns the tag namespace this binder reads.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Assigns matching values from `values` into `target`.
    ///
    /// An empty `values` is a no-op and does not inspect `target`.
    ///
    /// # Errors
    ///
    /// - [`BindError::InvalidTarget`] if `target` is a null handle.
    /// - [`BindError::Conversion`] if a value does not parse as its field's kind.
    /// - [`BindError::UnsupportedFieldKind`] if a matched field has a kind
    ///   the binder cannot convert into.
    ///
    /// Fields processed before the failing one keep their new values.
    pub fn bind<T>(&self, target: &mut T, values: &Values) -> Result<(), BindError>
    where
        T: Bindable + ?Sized,
    {
        if values.is_empty() {
            return Ok(());
        }

        for field in target.fields()? {
            let Some(tag) = field.tag(self.tag) else {
                continue;
            };
            if tag.is_empty() || tag == SKIP_TAG {
                continue;
            }
            let raw = match values.get(tag) {
                Some(raw) if !raw.is_empty() => raw,
                _ => continue,
            };

            let Field { name, slot, .. } = field;
            assign(name, slot, raw)?;
            trace!(field = name, tag, namespace = self.tag, "bound field");
        }

        Ok(())
    }
}

fn assign(field: &'static str, slot: Slot<'_>, raw: &str) -> Result<(), BindError> {
    let kind = slot.kind();
    let fail = |source: ParseFailure| BindError::Conversion {
        field,
        raw: raw.to_owned(),
        kind,
        source,
    };

    macro_rules! signed {
        ($dst:expr) => {
            *$dst = raw.parse().map_err(|e: ParseIntError| fail(e.into()))?
        };
    }
    macro_rules! unsigned {
        ($dst:expr) => {
            *$dst = parse_unsigned(raw).map_err(fail)?
        };
    }
    macro_rules! float {
        ($dst:expr) => {
            *$dst = parse_float(raw).map_err(fail)?
        };
    }

    match slot {
        Slot::Str(dst) => *dst = raw.to_owned(),
        Slot::I8(dst) => signed!(dst),
        Slot::I16(dst) => signed!(dst),
        Slot::I32(dst) => signed!(dst),
        Slot::I64(dst) => signed!(dst),
        Slot::I128(dst) => signed!(dst),
        Slot::Isize(dst) => signed!(dst),
        Slot::U8(dst) => unsigned!(dst),
        Slot::U16(dst) => unsigned!(dst),
        Slot::U32(dst) => unsigned!(dst),
        Slot::U64(dst) => unsigned!(dst),
        Slot::U128(dst) => unsigned!(dst),
        Slot::Usize(dst) => unsigned!(dst),
        Slot::F32(dst) => float!(dst),
        Slot::F64(dst) => float!(dst),
        Slot::Bool(dst) => *dst = parse_bool(raw).ok_or_else(|| fail(ParseFailure::Bool))?,
        Slot::Unsupported(kind) => return Err(BindError::UnsupportedFieldKind { field, kind }),
    }

    Ok(())
}

// `str::parse` accepts a leading `+` for unsigned types; base-10 unsigned
// input here is digits only.
fn parse_unsigned<T>(raw: &str) -> Result<T, ParseFailure>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    if raw.starts_with(['+', '-']) {
        return Err(ParseFailure::Sign);
    }
    Ok(raw.parse()?)
}

// `str::parse` saturates to infinity on overflow; only an explicit
// infinity literal may bind as one.
fn parse_float<T>(raw: &str) -> Result<T, ParseFailure>
where
    T: std::str::FromStr<Err = ParseFloatError> + Into<f64> + Copy,
{
    let value: T = raw.parse()?;
    if value.into().is_infinite() && !is_infinity_literal(raw) {
        return Err(ParseFailure::Range);
    }
    Ok(value)
}

fn is_infinity_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    digits.eq_ignore_ascii_case("inf") || digits.eq_ignore_ascii_case("infinity")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        name: String,
        age: i32,
    }

    bindable!(Person {
        name [form = "n", url = "name"],
        age [form = "a", url = "age"],
    });

    #[derive(Debug, Default, PartialEq)]
    struct Everything {
        s: String,
        i8: i8,
        i64: i64,
        isize: isize,
        u16: u16,
        usize: usize,
        f32: f32,
        f64: f64,
        flag: bool,
        skipped: String,
        untagged: String,
    }

    bindable!(Everything {
        s [form = "s"],
        i8 [form = "i8"],
        i64 [form = "i64"],
        isize [form = "isize"],
        u16 [form = "u16"],
        usize [form = "usize"],
        f32 [form = "f32"],
        f64 [form = "f64"],
        flag [form = "flag"],
        skipped [form = "-"],
        untagged,
    });

    #[derive(Debug, Default)]
    struct WithList {
        first: String,
        tags: Vec<String>,
        last: String,
    }

    bindable!(WithList {
        first [form = "first"],
        tags [form = "tags"],
        last [form = "last"],
    });

    #[derive(Debug, Default)]
    struct Shadowed {
        a: String,
        b: String,
    }

    bindable!(Shadowed {
        a [form = "k"],
        b [form = "k"],
    });

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs.iter().copied().collect()
    }

    #[test]
    fn binds_name_and_age() {
        let mut p = Person::default();
        Binder::form()
            .bind(&mut p, &values(&[("n", "Alice"), ("a", "30")]))
            .unwrap();
        assert_eq!(p, Person { name: "Alice".into(), age: 30 });
    }

    #[test]
    fn namespace_selects_tags() {
        let mut p = Person::default();
        let source = values(&[("n", "form-name"), ("name", "query-name"), ("age", "7")]);
        Binder::query().bind(&mut p, &source).unwrap();
        assert_eq!(p.name, "query-name");
        assert_eq!(p.age, 7);

        let mut p = Person::default();
        Binder::form().bind(&mut p, &source).unwrap();
        assert_eq!(p.name, "form-name");
        assert_eq!(p.age, 0);
    }

    #[test]
    fn conversion_error_reports_field_and_raw() {
        let mut p = Person::default();
        let err = Binder::form()
            .bind(&mut p, &values(&[("a", "notanumber")]))
            .unwrap_err();
        match err {
            BindError::Conversion { field, raw, kind, .. } => {
                assert_eq!(field, "age");
                assert_eq!(raw, "notanumber");
                assert_eq!(kind, FieldKind::I32);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn conversion_error_keeps_earlier_assignments() {
        let mut p = Person::default();
        let err = Binder::form().bind(&mut p, &values(&[("n", "Bob"), ("a", "x")]));
        assert!(err.is_err());
        assert_eq!(p.name, "Bob");
        assert_eq!(p.age, 0);
    }

    #[test]
    fn empty_source_leaves_target_untouched() {
        let mut p = Person { name: "keep".into(), age: 5 };
        Binder::form().bind(&mut p, &Values::new()).unwrap();
        assert_eq!(p, Person { name: "keep".into(), age: 5 });
    }

    #[test]
    fn empty_source_does_not_inspect_null_target() {
        let mut target: Option<Person> = None;
        assert!(Binder::form().bind(&mut target, &Values::new()).is_ok());
    }

    #[test]
    fn empty_value_is_treated_as_absent() {
        let mut p = Person { name: "prior".into(), age: 1 };
        Binder::form()
            .bind(&mut p, &values(&[("n", ""), ("a", "")]))
            .unwrap();
        assert_eq!(p, Person { name: "prior".into(), age: 1 });
    }

    #[test]
    fn only_first_value_is_used() {
        let mut p = Person::default();
        Binder::form()
            .bind(&mut p, &Values::parse("n=first&n=second&a=1&a=bogus"))
            .unwrap();
        assert_eq!(p.name, "first");
        assert_eq!(p.age, 1);
    }

    #[test]
    fn empty_first_value_hides_later_values() {
        let mut p = Person::default();
        Binder::form()
            .bind(&mut p, &Values::parse("n=&n=second"))
            .unwrap();
        assert_eq!(p.name, "");
    }

    #[test]
    fn converts_every_supported_kind() {
        let mut e = Everything::default();
        let source = values(&[
            ("s", "text"),
            ("i8", "-128"),
            ("i64", "9000000000"),
            ("isize", "-3"),
            ("u16", "65535"),
            ("usize", "42"),
            ("f32", "1.5"),
            ("f64", "-0.25"),
            ("flag", "T"),
            ("-", "ignored"),
            ("untagged", "ignored"),
        ]);
        Binder::form().bind(&mut e, &source).unwrap();
        assert_eq!(e.s, "text");
        assert_eq!(e.i8, -128);
        assert_eq!(e.i64, 9_000_000_000);
        assert_eq!(e.isize, -3);
        assert_eq!(e.u16, 65535);
        assert_eq!(e.usize, 42);
        assert_eq!(e.f32, 1.5);
        assert_eq!(e.f64, -0.25);
        assert!(e.flag);
        assert_eq!(e.skipped, "");
        assert_eq!(e.untagged, "");
    }

    #[test]
    fn integer_width_is_enforced() {
        let mut e = Everything::default();
        let err = Binder::form()
            .bind(&mut e, &values(&[("i8", "128")]))
            .unwrap_err();
        assert!(matches!(
            err,
            BindError::Conversion { field: "i8", kind: FieldKind::I8, source: ParseFailure::Int(_), .. }
        ));
    }

    #[test]
    fn unsigned_width_is_enforced() {
        let mut e = Everything::default();
        let err = Binder::form()
            .bind(&mut e, &values(&[("u16", "65536")]))
            .unwrap_err();
        assert!(matches!(
            err,
            BindError::Conversion { field: "u16", kind: FieldKind::U16, source: ParseFailure::Int(_), .. }
        ));
        assert_eq!(e.u16, 0);
    }

    #[test]
    fn float_overflow_is_a_range_error() {
        for (key, raw, expected) in [("f32", "1e40", FieldKind::F32), ("f64", "1e400", FieldKind::F64)] {
            let mut e = Everything::default();
            let err = Binder::form()
                .bind(&mut e, &values(&[(key, raw)]))
                .unwrap_err();
            match err {
                BindError::Conversion { kind, source: ParseFailure::Range, .. } => assert_eq!(kind, expected),
                other => panic!("unexpected error for {raw}: {other:?}"),
            }
            assert!(e.f32 == 0.0 && e.f64 == 0.0);
        }
    }

    #[test]
    fn float_infinity_literals_bind() {
        let mut e = Everything::default();
        Binder::form()
            .bind(&mut e, &values(&[("f32", "-Infinity"), ("f64", "inf")]))
            .unwrap();
        assert_eq!(e.f32, f32::NEG_INFINITY);
        assert_eq!(e.f64, f64::INFINITY);
    }

    #[test]
    fn unsigned_rejects_signs() {
        for raw in ["-1", "+1"] {
            let mut e = Everything::default();
            let err = Binder::form()
                .bind(&mut e, &values(&[("u16", raw)]))
                .unwrap_err();
            assert!(matches!(
                err,
                BindError::Conversion { field: "u16", source: ParseFailure::Sign, .. }
            ));
        }
    }

    #[test]
    fn bool_literals() {
        for (raw, expected) in [
            ("1", true),
            ("t", true),
            ("TRUE", true),
            ("True", true),
            ("0", false),
            ("F", false),
            ("false", false),
        ] {
            let mut e = Everything { flag: !expected, ..Default::default() };
            Binder::form()
                .bind(&mut e, &values(&[("flag", raw)]))
                .unwrap();
            assert_eq!(e.flag, expected, "literal {raw}");
        }

        let mut e = Everything::default();
        let err = Binder::form()
            .bind(&mut e, &values(&[("flag", "yes")]))
            .unwrap_err();
        assert!(matches!(err, BindError::Conversion { source: ParseFailure::Bool, .. }));
    }

    #[test]
    fn unsupported_kind_errors_after_earlier_fields() {
        let mut w = WithList::default();
        let err = Binder::form()
            .bind(&mut w, &values(&[("first", "a"), ("tags", "x"), ("last", "z")]))
            .unwrap_err();
        assert!(matches!(
            err,
            BindError::UnsupportedFieldKind { field: "tags", kind: "sequence" }
        ));
        assert_eq!(w.first, "a");
        assert_eq!(w.last, "");
        assert!(w.tags.is_empty());
    }

    #[test]
    fn unsupported_kind_without_value_is_skipped() {
        let mut w = WithList::default();
        Binder::form()
            .bind(&mut w, &values(&[("first", "a"), ("last", "z")]))
            .unwrap();
        assert_eq!(w.last, "z");
    }

    #[test]
    fn later_field_with_same_tag_wins() {
        let mut s = Shadowed::default();
        Binder::form().bind(&mut s, &values(&[("k", "v")])).unwrap();
        assert_eq!(s.a, "v");
        assert_eq!(s.b, "v");

        let mut s = Shadowed { a: String::new(), b: "old".into() };
        Binder::form().bind(&mut s, &values(&[("k", "new")])).unwrap();
        assert_eq!(s.b, "new");
    }

    #[test]
    fn null_target_is_invalid() {
        let mut target: Option<Person> = None;
        let err = Binder::form()
            .bind(&mut target, &values(&[("n", "x")]))
            .unwrap_err();
        assert!(matches!(err, BindError::InvalidTarget));
    }

    #[test]
    fn boxed_and_optional_targets_delegate() {
        let mut boxed = Box::new(Person::default());
        Binder::form().bind(&mut boxed, &values(&[("n", "Box")])).unwrap();
        assert_eq!(boxed.name, "Box");

        let mut some = Some(Person::default());
        Binder::form().bind(&mut some, &values(&[("a", "9")])).unwrap();
        assert_eq!(some.map(|p| p.age), Some(9));
    }

    #[test]
    fn manual_field_table() {
        struct Pair {
            key: String,
            count: u8,
        }

        impl Bindable for Pair {
            fn fields(&mut self) -> Result<Vec<Field<'_>>, BindError> {
                Ok(vec![
                    Field::new("key", &[("form", "k")], self.key.slot()),
                    Field::new("count", &[("form", "c")], self.count.slot()),
                ])
            }
        }

        let mut pair = Pair { key: String::new(), count: 0 };
        Binder::form()
            .bind(&mut pair, &values(&[("k", "x"), ("c", "4")]))
            .unwrap();
        assert_eq!(pair.key, "x");
        assert_eq!(pair.count, 4);
    }

    #[test]
    fn field_descriptor_accessors() {
        let mut p = Person::default();
        let fields = p.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "name");
        assert_eq!(fields[0].tag("url"), Some("name"));
        assert_eq!(fields[0].tag("json"), None);
        assert_eq!(fields[1].kind(), FieldKind::I32);
    }
}
