use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::libs::error::{InvalidFieldReason, SchemaViolation};

/// Combinable attribute flags for a single field.
///
/// Exactly one of `TEXT`, `DATE` or `INTEGER` must be present; `PRIMARY_KEY`
/// and `FOREIGN_KEY` are modifiers layered on top of that base type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKind(u32);

impl FieldKind {
    pub const TEXT: FieldKind = FieldKind(0x01);
    pub const DATE: FieldKind = FieldKind(0x02);
    pub const INTEGER: FieldKind = FieldKind(0x04);
    pub const PRIMARY_KEY: FieldKind = FieldKind(0x10);
    pub const FOREIGN_KEY: FieldKind = FieldKind(0x20);

    const BASE_MASK: u32 = 0x01 | 0x02 | 0x04;
    const KNOWN_MASK: u32 = Self::BASE_MASK | 0x10 | 0x20;

    pub const fn empty() -> Self {
        FieldKind(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        FieldKind(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: FieldKind) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_primary_key(self) -> bool {
        self.contains(Self::PRIMARY_KEY)
    }

    pub const fn is_foreign_key(self) -> bool {
        self.contains(Self::FOREIGN_KEY)
    }

    /// The single base storage type carried by these flags.
    pub fn base_type(self) -> Result<BaseType, InvalidFieldReason> {
        if self.0 & !Self::KNOWN_MASK != 0 {
            return Err(InvalidFieldReason::UnknownFlags(self.0 & !Self::KNOWN_MASK));
        }
        match self.0 & Self::BASE_MASK {
            0 => Err(InvalidFieldReason::MissingBaseType),
            0x01 => Ok(BaseType::Text),
            0x02 => Ok(BaseType::Date),
            0x04 => Ok(BaseType::Integer),
            _ => Err(InvalidFieldReason::MultipleBaseTypes),
        }
    }
}

impl BitOr for FieldKind {
    type Output = FieldKind;

    fn bitor(self, rhs: FieldKind) -> FieldKind {
        FieldKind(self.0 | rhs.0)
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::TEXT, "TEXT"),
            (Self::DATE, "DATE"),
            (Self::INTEGER, "INTEGER"),
            (Self::PRIMARY_KEY, "PRIMARY_KEY"),
            (Self::FOREIGN_KEY, "FOREIGN_KEY"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "FieldKind({:#x})", self.0)
        } else {
            write!(f, "FieldKind({})", set.join(" | "))
        }
    }
}

/// Base storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Text,
    Date,
    Integer,
}

impl BaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::Text => "TEXT",
            BaseType::Date => "DATE",
            BaseType::Integer => "INTEGER",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a foreign key: `table.field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub field: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

impl FromStr for ForeignKeyRef {
    type Err = InvalidFieldReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((table, field))
                if is_identifier(table) && is_identifier(field) =>
            {
                Ok(ForeignKeyRef::new(table, field))
            }
            _ => Err(InvalidFieldReason::MalformedReference(s.to_string())),
        }
    }
}

/// One named, typed field of a table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    base: BaseType,
    references: Option<ForeignKeyRef>,
}

impl FieldDescriptor {
    /// Build a field, checking its name, its flags and the reference target.
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        references: Option<ForeignKeyRef>,
    ) -> Result<Self, SchemaViolation> {
        let name = name.into();
        let invalid = |reason| SchemaViolation::InvalidField {
            field: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid(InvalidFieldReason::EmptyName));
        }
        if !is_identifier(&name) {
            return Err(invalid(InvalidFieldReason::NotAnIdentifier));
        }
        let base = kind.base_type().map_err(invalid)?;
        match (kind.is_foreign_key(), &references) {
            (true, None) => return Err(invalid(InvalidFieldReason::MissingReference)),
            (false, Some(_)) => return Err(invalid(InvalidFieldReason::UnexpectedReference)),
            (true, Some(target)) if !is_identifier(&target.table) || !is_identifier(&target.field) => {
                return Err(invalid(InvalidFieldReason::MalformedReference(target.to_string())));
            }
            _ => {}
        }

        Ok(Self {
            name,
            kind,
            base,
            references,
        })
    }

    /// Shorthand for a field without a foreign key.
    pub fn plain(name: impl Into<String>, kind: FieldKind) -> Result<Self, SchemaViolation> {
        Self::new(name, kind, None)
    }

    /// Shorthand for a foreign key field; `FOREIGN_KEY` is added to `kind`.
    pub fn foreign(
        name: impl Into<String>,
        kind: FieldKind,
        target: ForeignKeyRef,
    ) -> Result<Self, SchemaViolation> {
        Self::new(name, kind | FieldKind::FOREIGN_KEY, Some(target))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn base_type(&self) -> BaseType {
        self.base
    }

    pub fn is_primary_key(&self) -> bool {
        self.kind.is_primary_key()
    }

    pub fn references(&self) -> Option<&ForeignKeyRef> {
        self.references.as_ref()
    }
}

/// `<name> <BASE_TYPE> [PRIMARY KEY] [FOREIGN KEY -> <table>.<field>]`
impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.base)?;
        if self.is_primary_key() {
            f.write_str(" PRIMARY KEY")?;
        }
        if let Some(target) = &self.references {
            write!(f, " FOREIGN KEY -> {}", target)?;
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
