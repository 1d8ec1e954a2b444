//! Caller-supplied transform options.
//!
//! The option set is closed: unknown fields are rejected, the only output format is
//! WebP, dimensions are integers in `16..=10000` and quality an integer in `1..=100`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use validator::Validate;

use crate::constants::{
    DEFAULT_OPTIMIZED_QUALITY, DEFAULT_OPTIMIZED_WIDTH, DEFAULT_THUMBNAIL_QUALITY,
    DEFAULT_THUMBNAIL_WIDTH,
};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
}

/// Bounding box and quality for one derived output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OutputOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 16, max = 10000))]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 16, max = 10000))]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 100))]
    pub quality: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub optimized: Option<OutputOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub thumbnail: Option<OutputOptions>,
}

impl TransformOptions {
    /// Parse the raw `options` form field of an upload.
    ///
    /// Absent or blank input means "use defaults" and yields `None`.
    pub fn parse_field(raw: Option<&str>) -> Result<Option<Self>, AppError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        let value: JsonValue = serde_json::from_str(raw)
            .map_err(|_| AppError::InvalidInput("Invalid JSON in \"options\"".to_string()))?;
        if !value.is_object() {
            return Err(AppError::InvalidInput(
                "\"options\" must be a JSON object".to_string(),
            ));
        }

        let options: TransformOptions = serde_json::from_value(value)
            .map_err(|e| AppError::InvalidInput(format!("Invalid \"options\": {}", e)))?;
        options.validate()?;
        Ok(Some(options))
    }

    /// Effective settings for both outputs, filling in defaults.
    pub fn resolve(options: Option<&TransformOptions>) -> ResolvedTransform {
        ResolvedTransform {
            optimized: ResolvedOutput::from_options(
                options.and_then(|o| o.optimized.as_ref()),
                DEFAULT_OPTIMIZED_WIDTH,
                DEFAULT_OPTIMIZED_QUALITY,
            ),
            thumbnail: ResolvedOutput::from_options(
                options.and_then(|o| o.thumbnail.as_ref()),
                DEFAULT_THUMBNAIL_WIDTH,
                DEFAULT_THUMBNAIL_QUALITY,
            ),
        }
    }
}

/// Effective bounding box and quality for one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: u8,
}

impl ResolvedOutput {
    fn from_options(options: Option<&OutputOptions>, default_width: u32, default_quality: u8) -> Self {
        let Some(options) = options else {
            return Self {
                max_width: Some(default_width),
                max_height: None,
                quality: default_quality,
            };
        };

        // A block that only tunes quality keeps the default bounding box
        let (max_width, max_height) = match (options.width, options.height) {
            (None, None) => (Some(default_width), None),
            dims => dims,
        };
        let quality = options
            .quality
            .and_then(|q| u8::try_from(q).ok())
            .unwrap_or(default_quality);

        Self {
            max_width,
            max_height,
            quality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTransform {
    pub optimized: ResolvedOutput,
    pub thumbnail: ResolvedOutput,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Option<TransformOptions>, AppError> {
        TransformOptions::parse_field(Some(raw))
    }

    #[test]
    fn test_absent_options_are_none() {
        assert!(TransformOptions::parse_field(None).unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_valid_options() {
        let options = parse(
            r#"{"format":"webp","optimized":{"width":800,"quality":75},"thumbnail":{"height":200}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(options.format, Some(OutputFormat::Webp));
        assert_eq!(options.optimized.as_ref().unwrap().width, Some(800));
        assert_eq!(options.thumbnail.as_ref().unwrap().height, Some(200));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref msg) if msg == "Invalid JSON in \"options\""));
    }

    #[test]
    fn test_non_object_rejected() {
        for raw in ["[1,2]", "42", "\"webp\"", "null"] {
            let err = parse(raw).unwrap_err();
            assert!(
                matches!(err, AppError::InvalidInput(ref msg) if msg.contains("must be a JSON object")),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(parse(r#"{"watermark":true}"#).is_err());
        assert!(parse(r#"{"optimized":{"width":100,"blur":3}}"#).is_err());
    }

    #[test]
    fn test_only_webp_format() {
        assert!(parse(r#"{"format":"png"}"#).is_err());
    }

    #[test]
    fn test_dimension_and_quality_bounds() {
        assert!(parse(r#"{"optimized":{"width":15}}"#).is_err());
        assert!(parse(r#"{"optimized":{"width":10001}}"#).is_err());
        assert!(parse(r#"{"thumbnail":{"quality":0}}"#).is_err());
        assert!(parse(r#"{"thumbnail":{"quality":101}}"#).is_err());
        assert!(parse(r#"{"optimized":{"width":100.5}}"#).is_err());
        assert!(parse(r#"{"optimized":{"width":16,"height":10000,"quality":100}}"#).is_ok());
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = TransformOptions::resolve(None);
        assert_eq!(resolved.optimized.max_width, Some(1280));
        assert_eq!(resolved.optimized.max_height, None);
        assert_eq!(resolved.optimized.quality, 80);
        assert_eq!(resolved.thumbnail.max_width, Some(320));
        assert_eq!(resolved.thumbnail.quality, 70);
    }

    #[test]
    fn test_resolve_overrides_per_output() {
        let options = TransformOptions {
            format: None,
            optimized: Some(OutputOptions {
                width: None,
                height: Some(600),
                quality: None,
            }),
            thumbnail: Some(OutputOptions {
                width: None,
                height: None,
                quality: Some(40),
            }),
        };
        let resolved = TransformOptions::resolve(Some(&options));
        assert_eq!(resolved.optimized.max_width, None);
        assert_eq!(resolved.optimized.max_height, Some(600));
        assert_eq!(resolved.optimized.quality, 80);
        assert_eq!(resolved.thumbnail.max_width, Some(320));
        assert_eq!(resolved.thumbnail.quality, 40);
    }
}
