//! Calendar accessors. All of these read the simulated clock.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("TimeCurrent", "", "datetime", "Simulated server time"),
    ("TimeLocal", "", "datetime", "Simulated local time"),
    ("TimeGMT", "", "datetime", "Simulated GMT time"),
    ("TimeDay", "datetime time", "int", "Day of month of a timestamp"),
    ("TimeMonth", "datetime time", "int", "Month of a timestamp"),
    ("TimeYear", "datetime time", "int", "Year of a timestamp"),
    ("TimeHour", "datetime time", "int", "Hour of a timestamp"),
    ("TimeMinute", "datetime time", "int", "Minute of a timestamp"),
    ("TimeSeconds", "datetime time", "int", "Second of a timestamp"),
    ("TimeDayOfWeek", "datetime time", "int", "Day of week, Sunday is 0"),
    ("TimeDayOfYear", "datetime time", "int", "Day of year, January 1st is 1"),
    ("Day", "", "int", "Day of month of the current time"),
    ("Month", "", "int", "Month of the current time"),
    ("Year", "", "int", "Year of the current time"),
    ("Hour", "", "int", "Hour of the current time"),
    ("Minute", "", "int", "Minute of the current time"),
    ("Seconds", "", "int", "Second of the current time"),
    ("DayOfWeek", "", "int", "Day of week of the current time, Sunday is 0"),
    ("DayOfYear", "", "int", "Day of year of the current time"),
];
