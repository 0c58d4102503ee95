//! Operations: validated, parameterised pixel transforms.
//!
//! An [`Operation`] can only be built with valid parameters, either with
//! the constructors of its parameter types, through serde, or by parsing an
//! [`OperationSpec`] (the raw `name=value,...` form typed on the command
//! line). Invalid parameters are rejected here and never reach the
//! pixel-processing code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::edge::EdgeMethod;
use crate::geometry::{FlipDirection, ScaleMode};
use crate::tonal::Level;
use crate::types::PipelineError;

/// One named, parameterised pixel transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// Mirror the image.
    Flip {
        /// Axis to mirror across.
        direction: FlipDirection,
    },
    /// Resize the image with the configured resample kernel.
    Scale {
        /// How the output size is derived.
        mode: ScaleMode,
    },
    /// Hand the image to the background removal adapter.
    RemoveBackground,
    /// Invert the color channels.
    Invert,
    /// Convert to single-channel luminance.
    Grayscale,
    /// Replace the image with an edge map.
    EdgeDetection {
        /// Detector to run.
        method: EdgeMethod,
    },
    /// Scale color samples by a factor.
    Brightness {
        /// Strength in `[-100, 100]`.
        level: Level,
    },
    /// Stretch color samples around the midpoint.
    Contrast {
        /// Strength in `[-100, 100]`.
        level: Level,
    },
    /// Blend pixels toward or away from their luminance.
    Saturation {
        /// Strength in `[-100, 100]`.
        level: Level,
    },
}

impl Operation {
    /// Snake-case kind name, as used in recipes and on the command line.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Flip { .. } => "flip",
            Self::Scale { .. } => "scale",
            Self::RemoveBackground => "remove_background",
            Self::Invert => "invert",
            Self::Grayscale => "grayscale",
            Self::EdgeDetection { .. } => "edge_detection",
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Saturation { .. } => "saturation",
        }
    }

    /// Validate a raw spec.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownOperation`] for an unrecognised
    /// name and [`PipelineError::InvalidArgument`] for missing, surplus
    /// or malformed values.
    pub fn parse(spec: &OperationSpec) -> Result<Self, PipelineError> {
        let values: Vec<&str> = spec.values.iter().map(String::as_str).collect();
        let name = spec.name.trim().to_ascii_lowercase().replace('-', "_");
        match name.as_str() {
            "flip" => Ok(Self::Flip {
                direction: single(&name, &values)?.parse()?,
            }),
            "scale" => Ok(Self::Scale {
                mode: parse_scale(&values)?,
            }),
            "remove_background" | "rembg" => none(&name, &values).map(|()| Self::RemoveBackground),
            "invert" => none(&name, &values).map(|()| Self::Invert),
            "grayscale" | "greyscale" => none(&name, &values).map(|()| Self::Grayscale),
            "edge_detection" | "edge" | "edges" => Ok(Self::EdgeDetection {
                method: single(&name, &values)?.parse()?,
            }),
            "brightness" => Ok(Self::Brightness {
                level: single(&name, &values)?.parse()?,
            }),
            "contrast" => Ok(Self::Contrast {
                level: single(&name, &values)?.parse()?,
            }),
            "saturation" => Ok(Self::Saturation {
                level: single(&name, &values)?.parse()?,
            }),
            _ => Err(PipelineError::UnknownOperation(spec.name.clone())),
        }
    }

    /// Human-readable progress line shown before the operation runs.
    #[must_use]
    pub fn progress_message(&self, image_name: &str, threshold: u8) -> String {
        match self {
            Self::Flip { direction } => format!("Flipping \"{image_name}\" {direction}..."),
            Self::Scale { mode } => format!("Scaling \"{image_name}\" to {mode}..."),
            Self::RemoveBackground => format!("Removing background of \"{image_name}\"..."),
            Self::Invert => format!("Inverting the colors of \"{image_name}\"..."),
            Self::Grayscale => format!("Converting \"{image_name}\" to grayscale..."),
            Self::EdgeDetection {
                method: EdgeMethod::Kovalevsky,
            } => format!(
                "Applying kovalevsky edge detection to \"{image_name}\" with threshold {threshold}..."
            ),
            Self::EdgeDetection { method } => {
                format!("Applying {method} edge detection to \"{image_name}\"...")
            }
            Self::Brightness { level } => {
                format!("Adjusting brightness of \"{image_name}\" by {level}...")
            }
            Self::Contrast { level } => format!("Adjusting contrast of \"{image_name}\" by {level}..."),
            Self::Saturation { level } => {
                format!("Adjusting saturation of \"{image_name}\" by {level}...")
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())?;
        match self {
            Self::Flip { direction } => write!(f, "={direction}"),
            Self::Scale { mode } => write!(f, "={mode}"),
            Self::EdgeDetection { method } => write!(f, "={method}"),
            Self::Brightness { level } | Self::Contrast { level } | Self::Saturation { level } => {
                write!(f, "={level}")
            }
            Self::RemoveBackground | Self::Invert | Self::Grayscale => Ok(()),
        }
    }
}

fn single<'a>(name: &str, values: &[&'a str]) -> Result<&'a str, PipelineError> {
    match *values {
        [value] => Ok(value),
        _ => Err(PipelineError::invalid(format!(
            "{name} takes exactly one value, got {}",
            values.len()
        ))),
    }
}

fn none(name: &str, values: &[&str]) -> Result<(), PipelineError> {
    if values.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::invalid(format!("{name} takes no values")))
    }
}

/// `1.5x` (factor) or `400px 300px` (fit within box, `px` optional).
fn parse_scale(values: &[&str]) -> Result<ScaleMode, PipelineError> {
    match *values {
        [factor] => {
            let lower = factor.trim().to_ascii_lowercase();
            let number = lower.strip_suffix('x').ok_or_else(|| {
                PipelineError::invalid(format!(
                    "invalid scale '{factor}' (use '1.5x' or '400px 300px')"
                ))
            })?;
            let f: f64 = number
                .parse()
                .map_err(|_| PipelineError::invalid(format!("invalid scale factor: {factor}")))?;
            ScaleMode::factor(f)
        }
        [width, height] => {
            let side = |s: &str| -> Result<u32, PipelineError> {
                let lower = s.trim().to_ascii_lowercase();
                lower
                    .strip_suffix("px")
                    .unwrap_or(&lower)
                    .parse()
                    .map_err(|_| PipelineError::invalid(format!("invalid size format: {s}")))
            };
            ScaleMode::fit_within(side(width)?, side(height)?)
        }
        _ => Err(PipelineError::invalid(
            "invalid format for scale (use '1.5x' or '400px 300px')",
        )),
    }
}

/// The raw, unvalidated form of an operation: a name and its values.
///
/// Parsed from `name`, `name=value` or `name=v1,v2` (whitespace between
/// values is accepted too, so `scale=400px 300px` works).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Operation name, e.g. `flip`.
    pub name: String,
    /// Positional values, e.g. `["horizontal"]`.
    #[serde(default)]
    pub values: Vec<String>,
}

impl OperationSpec {
    /// Build a spec from parts.
    #[must_use]
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl FromStr for OperationSpec {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s.split_once('=').unwrap_or((s, ""));
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::invalid(format!("missing operation name in '{s}'")));
        }
        let values = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(Self {
            name: name.to_owned(),
            values,
        })
    }
}

impl fmt::Display for OperationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.values.is_empty() {
            write!(f, "={}", self.values.join(","))?;
        }
        Ok(())
    }
}

impl From<Operation> for OperationSpec {
    fn from(op: Operation) -> Self {
        let values = match op {
            Operation::Flip { direction } => vec![direction.to_string()],
            Operation::Scale {
                mode: ScaleMode::Factor(f),
            } => vec![format!("{f}x")],
            Operation::Scale {
                mode: ScaleMode::FitWithin { width, height },
            } => vec![format!("{width}px"), format!("{height}px")],
            Operation::EdgeDetection { method } => vec![method.to_string()],
            Operation::Brightness { level }
            | Operation::Contrast { level }
            | Operation::Saturation { level } => vec![level.to_string()],
            Operation::RemoveBackground | Operation::Invert | Operation::Grayscale => Vec::new(),
        };
        Self {
            name: op.kind().to_owned(),
            values,
        }
    }
}
