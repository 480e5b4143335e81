//! String handling and the text/number conversion family.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("StringLen", "string text", "int", "Number of characters"),
    ("StringSubstr", "string text, int start, [int length]", "string", "Substring from start"),
    ("StringFind", "string text, string needle, [int start]", "int", "Index of a substring or -1"),
    ("StringReplace", "string text, string from, string to", "string", "Copy with every occurrence replaced"),
    ("StringSplit", "string text, int separator, array parts", "int", "Split into an array, returns part count"),
    ("StringConcatenate", "any value, ...", "string", "Concatenate the arguments as text"),
    ("StringToUpper", "string text", "string", "Upper-case copy"),
    ("StringToLower", "string text", "string", "Lower-case copy"),
    ("StringTrimLeft", "string text", "string", "Copy without leading whitespace"),
    ("StringTrimRight", "string text", "string", "Copy without trailing whitespace"),
    ("StringGetChar", "string text, int position", "int", "Character code at a position"),
    ("StringSetChar", "string text, int position, int code", "string", "Copy with one character replaced"),
    ("StringCompare", "string a, string b, [bool case_sensitive]", "int", "Lexicographic compare, -1/0/1"),
    ("CharToString", "int code", "string", "One-character string from a code"),
    ("NormalizeDouble", "double value, int digits", "double", "Round to a fixed number of digits"),
    ("DoubleToString", "double value, [int digits]", "string", "Format with fixed digits, default 8"),
    ("IntegerToString", "int value, [int length], [int filler]", "string", "Format an integer, optionally padded"),
    ("StringToDouble", "string text", "double", "Parse a number, 0 when unparsable"),
    ("StringToInteger", "string text", "int", "Parse an integer, 0 when unparsable"),
    ("StringToTime", "string text", "datetime", "Parse YYYY.MM.DD [HH:MM[:SS]]"),
    ("TimeToString", "datetime time, [int flags]", "string", "Format a timestamp"),
    ("CharArrayToString", "array source, [int start], [int count]", "string", "Build a string from character codes"),
    ("StringToCharArray", "string text, array target, [int start], [int count]", "int", "Write character codes, returns count"),
    ("ColorToString", "color value", "string", "Format as R,G,B"),
    ("DoubleToStr", "double value, [int digits]", "string", "Format with fixed digits, default 8"),
    ("StrToDouble", "string text", "double", "Parse a number, 0 when unparsable"),
    ("StrToInteger", "string text", "int", "Parse an integer, 0 when unparsable"),
    ("TimeToStr", "datetime time, [int flags]", "string", "Format a timestamp"),
];
