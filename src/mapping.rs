// Property-to-column binding with compiled accessors.
//
// A record type declares its members once; each member compiles a getter
// and setter closure over the caller-supplied property accessors, with the
// conversion (trait-resolved or a per-member override) baked in. Readers
// and writers cache the map per type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::convert::{ConvertContext, ConvertError, CsvConvert, ValueConverter};

type Setter<T> =
    Box<dyn Fn(&mut T, &str, &ConvertContext<'_>) -> Result<(), ConvertError> + Send + Sync>;
type Getter<T> = Box<dyn Fn(&T, &mut String, &ConvertContext<'_>) + Send + Sync>;

/// A record type that can be read and written through column mapping.
pub trait CsvRecord: Default + Sized {
    fn type_map() -> TypeMap<Self>;
}

/// One bound member: column binding plus compiled accessors.
pub struct MemberMap<T> {
    name: String,
    index: Option<usize>,
    ignore: bool,
    setter: Setter<T>,
    getter: Getter<T>,
}

impl<T> MemberMap<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn explicit_index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    pub(crate) fn set(
        &self,
        record: &mut T,
        field: &str,
        ctx: &ConvertContext<'_>,
    ) -> Result<(), ConvertError> {
        (self.setter)(record, field, ctx)
    }

    pub(crate) fn format(&self, record: &T, dst: &mut String, ctx: &ConvertContext<'_>) {
        (self.getter)(record, dst, ctx)
    }
}

/// Fluent handle for overriding a member's binding.
pub struct MemberSettings<'a> {
    name: &'a mut String,
    index: &'a mut Option<usize>,
    ignore: &'a mut bool,
}

impl MemberSettings<'_> {
    /// Binds the member to a different column name.
    pub fn name(&mut self, name: &str) -> &mut Self {
        *self.name = name.to_string();
        self
    }

    /// Binds the member to an explicit column index.
    pub fn index(&mut self, index: usize) -> &mut Self {
        *self.index = Some(index);
        self
    }

    /// Excludes the member from reading and writing.
    pub fn ignore(&mut self) -> &mut Self {
        *self.ignore = true;
        self
    }
}

/// Ordered list of a record type's members.
pub struct TypeMap<T> {
    members: Vec<MemberMap<T>>,
}

impl<T> TypeMap<T> {
    pub fn new() -> Self {
        TypeMap {
            members: Vec::new(),
        }
    }

    /// Declares a member whose conversion is resolved through
    /// [`CsvConvert`].
    pub fn member<V: CsvConvert + 'static>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        let getter: Getter<T> =
            Box::new(move |record, dst, ctx| get(record).format_field(dst, ctx));
        let setter: Setter<T> = Box::new(move |record, field, ctx| {
            let value = V::parse_field(field, ctx)?;
            set(record, value);
            Ok(())
        });
        self.members.push(MemberMap {
            name: name.to_string(),
            index: None,
            ignore: false,
            setter,
            getter,
        });
        self
    }

    /// Declares a member routed through a custom converter instead of the
    /// type's [`CsvConvert`] implementation.
    pub fn member_with<V: 'static>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
        converter: impl ValueConverter<V> + 'static,
    ) -> Self {
        let converter = Arc::new(converter);
        let format_converter = Arc::clone(&converter);
        let getter: Getter<T> = Box::new(move |record, dst, ctx| {
            format_converter.format(&get(record), dst, ctx);
        });
        let setter: Setter<T> = Box::new(move |record, field, ctx| {
            let value = converter.parse(field, ctx)?;
            set(record, value);
            Ok(())
        });
        self.members.push(MemberMap {
            name: name.to_string(),
            index: None,
            ignore: false,
            setter,
            getter,
        });
        self
    }

    /// Fluent override by member selector: rebind name, index, or ignore.
    pub fn configure(mut self, member: &str, f: impl FnOnce(&mut MemberSettings<'_>)) -> Self {
        if let Some(m) = self.members.iter_mut().find(|m| m.name == member) {
            let mut settings = MemberSettings {
                name: &mut m.name,
                index: &mut m.index,
                ignore: &mut m.ignore,
            };
            f(&mut settings);
        }
        self
    }

    pub fn members(&self) -> &[MemberMap<T>] {
        &self.members
    }

    /// Emission and resolution order: members with explicit indices first
    /// (ascending, stable), then the rest in declaration order.
    pub(crate) fn ordered(&self) -> Vec<&MemberMap<T>> {
        let mut indexed: Vec<&MemberMap<T>> = self
            .members
            .iter()
            .filter(|m| m.index.is_some())
            .collect();
        indexed.sort_by_key(|m| m.index);
        indexed
            .into_iter()
            .chain(self.members.iter().filter(|m| m.index.is_none()))
            .collect()
    }
}

impl<T> Default for TypeMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-type cache of `TypeMap`s, owned by each reader/writer.
#[derive(Default)]
pub(crate) struct MapRegistry {
    maps: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MapRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ensure<T: CsvRecord + 'static>(&mut self) {
        self.maps
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::type_map()));
    }

    pub(crate) fn get<T: CsvRecord + 'static>(&self) -> Option<&TypeMap<T>> {
        self.maps
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<TypeMap<T>>())
    }

    /// Replaces the cached map, overriding `T::type_map()`.
    pub(crate) fn set<T: CsvRecord + 'static>(&mut self, map: TypeMap<T>) {
        self.maps.insert(TypeId::of::<T>(), Box::new(map));
    }
}
