//! Declaration shorthand.
//!
//! ```ignore
//! let movie = table!(registry, Movie {
//!     title: TEXT,
//!     releaseDate: DATE,
//!     directorId: INTEGER | FOREIGN_KEY => Director.directorId,
//!     movieId: INTEGER | PRIMARY_KEY,
//! })?;
//! ```

/// Field declarations as `name: FLAG | FLAG [=> Table.field]`.
///
/// Expands to a `Vec<Result<FieldDescriptor, SchemaViolation>>`, ready for
/// [`TableSchema::declare`](crate::TableSchema::declare).
#[macro_export]
macro_rules! fields {
    (@target) => {
        ::std::option::Option::None
    };
    (@target $table:ident . $field:ident) => {
        ::std::option::Option::Some($crate::ForeignKeyRef::new(
            stringify!($table),
            stringify!($field),
        ))
    };
    ($($name:ident : $($flag:ident)|+ $(=> $table:ident . $field:ident)?),* $(,)?) => {
        ::std::vec![
            $(
                $crate::FieldDescriptor::new(
                    stringify!($name),
                    $crate::FieldKind::empty() $(| $crate::FieldKind::$flag)+,
                    $crate::fields!(@target $($table . $field)?),
                )
            ),*
        ]
    };
}

/// Declare and register a table in one step.
///
/// Evaluates to `Result<Arc<TableSchema>, SchemaError>`.
#[macro_export]
macro_rules! table {
    ($registry:expr, $name:ident { $($body:tt)* }) => {
        $crate::TableSchema::declare(
            stringify!($name),
            $crate::fields![$($body)*],
            &$registry,
        )
    };
}
