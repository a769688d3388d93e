/// Construct a [`Value`][crate::Value] from a literal.
///
/// Maps use `key: value` entries, lists use brackets, and both nest. The
/// bare identifiers `None` and `Default` produce the TAL sentinels
/// [`Value::None`][crate::Value::None] and
/// [`Value::Default`][crate::Value::Default]; any other value goes through
/// `Value::from`.
///
/// ```
/// let ctx = tal::value! {
///     title: "Hello",
///     items: ["one", "two"],
///     missing: None,
///     keep: Default,
/// };
/// ```
#[macro_export]
macro_rules! value {
    (None) => {
        $crate::Value::None
    };
    (Default) => {
        $crate::Value::Default
    };
    ([]) => {
        $crate::Value::List($crate::List::new())
    };
    ({}) => {
        $crate::Value::Map($crate::Map::new())
    };
    ([ $($items:tt)+ ]) => {{
        let mut list = $crate::List::new();
        $crate::_value_items!(@list list $($items)+);
        $crate::Value::List(list)
    }};
    ({ $($entries:tt)+ }) => {{
        let mut map = $crate::Map::new();
        $crate::_value_items!(@map map $($entries)+);
        $crate::Value::Map(map)
    }};
    // Bare `key: value` entries, for the `value! { .. }` invocation form.
    ($key:ident : $($rest:tt)+) => {
        $crate::value!({ $key: $($rest)+ })
    };
    ($other:expr) => {
        $crate::Value::from($other)
    };
}

/// One accumulator statement per item. Each rule consumes one list item or
/// one `key: value` map entry plus the comma behind it, then recurses on
/// whatever is left; sentinel and bracket shapes must be matched before
/// the catch-all `expr` rules ever see them.
#[macro_export]
#[doc(hidden)]
macro_rules! _value_items {
    (@list $list:ident) => {};
    (@list $list:ident None $(, $($rest:tt)*)?) => {
        $list.push($crate::Value::None);
        $crate::_value_items!(@list $list $($($rest)*)?);
    };
    (@list $list:ident Default $(, $($rest:tt)*)?) => {
        $list.push($crate::Value::Default);
        $crate::_value_items!(@list $list $($($rest)*)?);
    };
    (@list $list:ident [ $($items:tt)* ] $(, $($rest:tt)*)?) => {
        $list.push($crate::value!([ $($items)* ]));
        $crate::_value_items!(@list $list $($($rest)*)?);
    };
    (@list $list:ident { $($entries:tt)* } $(, $($rest:tt)*)?) => {
        $list.push($crate::value!({ $($entries)* }));
        $crate::_value_items!(@list $list $($($rest)*)?);
    };
    (@list $list:ident $item:expr $(, $($rest:tt)*)?) => {
        $list.push($crate::Value::from($item));
        $crate::_value_items!(@list $list $($($rest)*)?);
    };

    (@map $map:ident) => {};
    (@map $map:ident $key:ident : None $(, $($rest:tt)*)?) => {
        $map.insert(stringify!($key).to_string(), $crate::Value::None);
        $crate::_value_items!(@map $map $($($rest)*)?);
    };
    (@map $map:ident $key:ident : Default $(, $($rest:tt)*)?) => {
        $map.insert(stringify!($key).to_string(), $crate::Value::Default);
        $crate::_value_items!(@map $map $($($rest)*)?);
    };
    (@map $map:ident $key:ident : [ $($items:tt)* ] $(, $($rest:tt)*)?) => {
        $map.insert(stringify!($key).to_string(), $crate::value!([ $($items)* ]));
        $crate::_value_items!(@map $map $($($rest)*)?);
    };
    (@map $map:ident $key:ident : { $($entries:tt)* } $(, $($rest:tt)*)?) => {
        $map.insert(stringify!($key).to_string(), $crate::value!({ $($entries)* }));
        $crate::_value_items!(@map $map $($($rest)*)?);
    };
    (@map $map:ident $key:ident : $value:expr $(, $($rest:tt)*)?) => {
        $map.insert(stringify!($key).to_string(), $crate::Value::from($value));
        $crate::_value_items!(@map $map $($($rest)*)?);
    };
}

#[cfg(test)]
mod tests {
    use crate::{Map, Value};

    #[test]
    fn sentinels() {
        assert_eq!(value!(None), Value::None);
        assert_eq!(value!(Default), Value::Default);
    }

    #[test]
    fn scalars() {
        assert_eq!(value!("testing..."), Value::from("testing..."));
        assert_eq!(value!(3), Value::Integer(3));
        assert_eq!(value!(1 + 2), Value::Integer(3));
    }

    #[test]
    fn lists() {
        assert_eq!(value!([]), Value::List(Vec::new()));
        let v = value!(["testing...", None, Default, {}]);
        assert_eq!(
            v,
            Value::from([
                Value::from("testing..."),
                Value::None,
                Value::Default,
                Value::Map(Map::new()),
            ])
        );
    }

    #[test]
    fn bare_entries() {
        let v = value! { x: "hello", y: [1, 2] };
        let exp = Value::from([("x", Value::from("hello")), ("y", Value::from([1, 2]))]);
        assert_eq!(v, exp);
    }

    #[test]
    fn maps_with_trailing_comma() {
        let v = value!({ x: "hello", y: None, });
        let exp = Value::from([("x", Value::from("hello")), ("y", Value::None)]);
        assert_eq!(v, exp);
    }

    #[test]
    fn nested() {
        let v = value!({
            w: "hello",
            x: {
                y: Default,
                z: [1, 2],
            },
        });
        let exp = Value::from([
            ("w", Value::from("hello")),
            (
                "x",
                Value::from([("y", Value::Default), ("z", Value::from([1, 2]))]),
            ),
        ]);
        assert_eq!(v, exp);
    }
}
