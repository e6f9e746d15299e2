//! String-to-type conversion for bound parameters.
//!
//! Every parameter bound from a header, path variable or query parameter
//! arrives as a string. A [`ConversionService`] maps the declared parameter
//! type to a [`Converter`]; the converter is looked up once, when the
//! handler method is declared, and reused for every request.
//!
//! Conversion rules for the built-in types:
//!
//! - `String` is passed through untouched, including the empty string.
//! - For every other type, blank input converts to null.
//! - Integers are trimmed and accept `0x`/`0X`/`#` hexadecimal forms.
//! - Booleans accept `true`/`on`/`yes`/`1` and `false`/`off`/`no`/`0`.
//! - `char` requires exactly one character.

use crate::Error;
use crate::logging::debug;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

/// A converted argument value with its concrete type erased.
pub type BoxedValue = Box<dyn Any + Send>;

type ConvertFn = Arc<dyn Fn(&str) -> Result<Option<BoxedValue>, Error> + Send + Sync>;

static SHARED: Lazy<Arc<ConversionService>> = Lazy::new(|| Arc::new(ConversionService::new()));

/// Converts raw strings into one target type.
#[derive(Clone)]
pub struct Converter {
    target: &'static str,
    convert: ConvertFn,
}

impl Converter {
    /// Name of the type this converter produces
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Convert a raw value. `Ok(None)` means the value converts to null.
    pub fn convert(&self, raw: &str) -> Result<Option<BoxedValue>, Error> {
        (self.convert)(raw)
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("target", &self.target)
            .finish()
    }
}

/// Registry of converters keyed by target type.
#[derive(Clone)]
pub struct ConversionService {
    converters: HashMap<TypeId, Converter>,
}

impl ConversionService {
    /// Create a service with the built-in converters registered.
    pub fn new() -> Self {
        let mut service = Self::empty();
        service.register_defaults();
        service
    }

    /// Create a service without any converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// The process-wide service holding the built-in converters.
    pub fn shared() -> Arc<ConversionService> {
        SHARED.clone()
    }

    /// Register a converter for `T`, replacing any previous one.
    ///
    /// The closure returns `Ok(None)` for input that converts to null and
    /// `Err` with a reason when the input cannot be converted; the reason is
    /// reported as a type mismatch.
    pub fn register<T, F>(&mut self, parse: F)
    where
        T: Send + 'static,
        F: Fn(&str) -> Result<Option<T>, String> + Send + Sync + 'static,
    {
        let target = type_name::<T>();
        let convert: ConvertFn = Arc::new(move |raw: &str| match parse(raw) {
            Ok(value) => Ok(value.map(|v| Box::new(v) as BoxedValue)),
            Err(reason) => {
                debug!(value = raw, target_type = target, reason = %reason, "Conversion failed");
                Err(Error::TypeMismatch {
                    value: raw.to_string(),
                    target,
                })
            }
        });
        self.converters
            .insert(TypeId::of::<T>(), Converter { target, convert });
    }

    /// Register a converter for any `FromStr` type, with blank input as null.
    pub fn register_from_str<T>(&mut self)
    where
        T: std::str::FromStr + Send + 'static,
        T::Err: std::fmt::Display,
    {
        self.register::<T, _>(|raw| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<T>().map(Some).map_err(|e| e.to_string())
        });
    }

    /// Look up the converter for `T`.
    pub fn converter_for<T: 'static>(&self) -> Option<Converter> {
        self.converters.get(&TypeId::of::<T>()).cloned()
    }

    pub fn can_convert<T: 'static>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<T>())
    }

    /// Convert a raw value to `T` directly.
    pub fn convert<T: 'static>(&self, raw: &str) -> Result<Option<T>, Error> {
        let converter = self.converter_for::<T>().ok_or_else(|| Error::TypeMismatch {
            value: raw.to_string(),
            target: type_name::<T>(),
        })?;

        match converter.convert(raw)? {
            Some(value) => value
                .downcast::<T>()
                .map(|v| Some(*v))
                .map_err(|_| {
                    Error::Internal(format!(
                        "converter for {} produced a different type",
                        type_name::<T>()
                    ))
                }),
            None => Ok(None),
        }
    }

    fn register_defaults(&mut self) {
        self.register::<String, _>(|raw| Ok(Some(raw.to_string())));
        self.register::<bool, _>(parse_bool);
        self.register::<char, _>(parse_char);

        macro_rules! register_integers {
            ($service:expr; $($ty:ty),+) => {
                $(
                    $service.register::<$ty, _>(|raw| match parse_integer(raw)? {
                        Some(value) => <$ty>::try_from(value)
                            .map(Some)
                            .map_err(|_| format!("{} is out of range for {}", value, stringify!($ty))),
                        None => Ok(None),
                    });
                )+
            };
        }
        register_integers!(self; i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

        self.register_from_str::<f32>();
        self.register_from_str::<f64>();
        self.register_from_str::<uuid::Uuid>();
    }
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<&str> = self.converters.values().map(|c| c.target).collect();
        targets.sort_unstable();
        f.debug_struct("ConversionService")
            .field("targets", &targets)
            .finish()
    }
}

fn parse_bool(raw: &str) -> Result<Option<bool>, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(Some(true)),
        "false" | "off" | "no" | "0" => Ok(Some(false)),
        other => Err(format!("invalid boolean value '{}'", other)),
    }
}

fn parse_char(raw: &str) -> Result<Option<char>, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(format!("'{}' has more than one character", raw)),
    }
}

/// Decimal or hexadecimal integer with an optional sign.
fn parse_integer(raw: &str) -> Result<Option<i128>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .or_else(|| unsigned.strip_prefix('#'))
    {
        Some(hex) => (16, hex),
        None => (10, unsigned),
    };

    if digits.starts_with(['+', '-']) {
        return Err(format!("invalid number '{}'", trimmed));
    }

    let magnitude = i128::from_str_radix(digits, radix).map_err(|e| e.to_string())?;
    Ok(Some(if negative { -magnitude } else { magnitude }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_passes_through() {
        let service = ConversionService::new();
        assert_eq!(service.convert::<String>("a b").unwrap(), Some("a b".to_string()));
        assert_eq!(service.convert::<String>("").unwrap(), Some(String::new()));
    }

    #[test]
    fn test_integers() {
        let service = ConversionService::new();
        assert_eq!(service.convert::<i32>(" 42 ").unwrap(), Some(42));
        assert_eq!(service.convert::<i64>("-0x1F").unwrap(), Some(-31));
        assert_eq!(service.convert::<u8>("#ff").unwrap(), Some(255));
        assert_eq!(service.convert::<i32>("").unwrap(), None);
    }

    #[test]
    fn test_integer_errors() {
        let service = ConversionService::new();
        assert!(matches!(
            service.convert::<u8>("256"),
            Err(Error::TypeMismatch { target: "u8", .. })
        ));
        assert!(matches!(service.convert::<u32>("-1"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(service.convert::<i32>("--5"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(service.convert::<i32>("abc"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_booleans() {
        let service = ConversionService::new();
        assert_eq!(service.convert::<bool>("YES").unwrap(), Some(true));
        assert_eq!(service.convert::<bool>("off").unwrap(), Some(false));
        assert_eq!(service.convert::<bool>(" ").unwrap(), None);
        assert!(service.convert::<bool>("maybe").is_err());
    }

    #[test]
    fn test_floats_chars_uuids() {
        let service = ConversionService::new();
        assert_eq!(service.convert::<f64>("2.5").unwrap(), Some(2.5));
        assert_eq!(service.convert::<char>("x").unwrap(), Some('x'));
        assert!(service.convert::<char>("xy").is_err());

        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(
            service.convert::<uuid::Uuid>(id).unwrap().map(|u| u.to_string()),
            Some(id.to_string())
        );
    }

    #[test]
    fn test_unknown_type_is_mismatch() {
        struct Unregistered;
        let service = ConversionService::new();
        assert!(!service.can_convert::<Unregistered>());
        assert!(matches!(
            service.convert::<Unregistered>("1"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_custom_converter() {
        #[derive(Debug, PartialEq)]
        struct Csv(Vec<String>);

        let mut service = ConversionService::empty();
        service.register::<Csv, _>(|raw| {
            Ok(Some(Csv(raw.split(',').map(str::to_string).collect())))
        });

        assert_eq!(
            service.convert::<Csv>("a,b").unwrap(),
            Some(Csv(vec!["a".into(), "b".into()]))
        );
        assert!(!service.can_convert::<i32>());
    }
}
