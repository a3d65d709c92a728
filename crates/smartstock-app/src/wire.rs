// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid decimal {raw:?}")),
        }
    }
}

pub(crate) mod timestamp {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::{Iso8601, Rfc3339};
    use time::{OffsetDateTime, PrimitiveDateTime};

    pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    // The backend emits naive timestamps for `timestamp without time zone`
    // columns; those are UTC.
    pub fn parse(raw: &str) -> Result<OffsetDateTime, String> {
        if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
            return Ok(value);
        }
        PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(|error| format!("invalid timestamp {raw:?}: {error}"))
    }
}

pub(crate) mod date {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;
    use time::macros::format_description;

    pub fn serialize<S>(value: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = value
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Date::parse(&raw, format_description!("[year]-[month]-[day]"))
            .map_err(|error| D::Error::custom(format!("invalid date {raw:?}: {error}")))
    }
}

pub(crate) mod decimal {
    use super::NumberOrText;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        NumberOrText::deserialize(deserializer)?
            .into_f64()
            .map_err(D::Error::custom)
    }
}

pub(crate) mod decimal_option {
    use super::NumberOrText;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<NumberOrText>::deserialize(deserializer)?
            .map(NumberOrText::into_f64)
            .transpose()
            .map_err(D::Error::custom)
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
