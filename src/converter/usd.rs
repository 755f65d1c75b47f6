use serde::Deserialize;
use std::fmt::Display;
use std::io::{self, Write};

use super::gaussians::Gaussians;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpAxis {
    Y,
    Z,
}

impl Display for UpAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpAxis::Y => f.write_str("Y"),
            UpAxis::Z => f.write_str("Z"),
        }
    }
}

/// Stage-level settings for exported layers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
    /// Point width as a multiple of the largest gaussian scale.
    pub width_scale: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            up_axis: UpAxis::Y,
            meters_per_unit: 1.0,
            width_scale: 2.0,
        }
    }
}

pub const ROOT_PRIM: &str = "Root";
pub const POINTS_PRIM: &str = "Gaussians";

/// Write `gaussians` as a USDA text layer.
pub fn write_layer<W: Write>(
    w: &mut W,
    gaussians: &Gaussians,
    settings: &ExportSettings,
) -> io::Result<()> {
    let n = gaussians.len();

    writeln!(w, "#usda 1.0")?;
    writeln!(w, "(")?;
    writeln!(w, "    defaultPrim = \"{}\"", ROOT_PRIM)?;
    writeln!(w, "    doc = \"Generated by plyusdz\"")?;
    writeln!(w, "    metersPerUnit = {}", settings.meters_per_unit)?;
    writeln!(w, "    upAxis = \"{}\"", settings.up_axis)?;
    writeln!(w, ")")?;
    writeln!(w)?;
    writeln!(w, "def Xform \"{}\"", ROOT_PRIM)?;
    writeln!(w, "{{")?;
    writeln!(w, "    def Points \"{}\"", POINTS_PRIM)?;
    writeln!(w, "    {{")?;

    if let Some((min, max)) = gaussians.extent() {
        writeln!(w, "        float3[] extent = [{}, {}]", tuple(&min), tuple(&max))?;
    }

    write_array(w, "point3f[] points", None, (0..n).map(|i| tuple(&gaussians.positions[i])))?;
    write_array(
        w,
        "float[] widths",
        None,
        (0..n).map(|i| {
            let s = gaussians.scale(i);
            float(settings.width_scale * s[0].max(s[1]).max(s[2]))
        }),
    )?;
    write_array(
        w,
        "color3f[] primvars:displayColor",
        Some(("vertex", None)),
        (0..n).map(|i| tuple(&gaussians.color(i))),
    )?;
    write_array(
        w,
        "float[] primvars:displayOpacity",
        Some(("vertex", None)),
        (0..n).map(|i| float(gaussians.opacity(i))),
    )?;
    write_array(
        w,
        "float3[] primvars:gaussian:scales",
        Some(("vertex", None)),
        (0..n).map(|i| tuple(&gaussians.scale(i))),
    )?;
    write_array(
        w,
        "quatf[] primvars:gaussian:orientations",
        Some(("vertex", None)),
        (0..n).map(|i| tuple(&gaussians.rotation(i))),
    )?;

    writeln!(
        w,
        "        int primvars:gaussian:shDegree = {} (\n            interpolation = \"constant\"\n        )",
        gaussians.sh_degree
    )?;

    let rest = gaussians.rest_per_point();
    if rest > 0 {
        write_array(
            w,
            "float[] primvars:gaussian:shRest",
            Some(("vertex", Some(rest))),
            gaussians.sh_rest.iter().map(|v| float(*v)),
        )?;
    }

    writeln!(w, "    }}")?;
    writeln!(w, "}}")?;
    Ok(())
}

fn write_array<W, I>(
    w: &mut W,
    decl: &str,
    primvar: Option<(&str, Option<usize>)>,
    values: I,
) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = String>,
{
    write!(w, "        {} = [", decl)?;
    for (i, v) in values.enumerate() {
        if i > 0 {
            w.write_all(b", ")?;
        }
        w.write_all(v.as_bytes())?;
    }
    match primvar {
        None => writeln!(w, "]"),
        Some((interpolation, element_size)) => {
            writeln!(w, "] (")?;
            if let Some(size) = element_size {
                writeln!(w, "            elementSize = {}", size)?;
            }
            writeln!(w, "            interpolation = \"{}\"", interpolation)?;
            writeln!(w, "        )")
        }
    }
}

/// USDA has no literal for NaN or infinity, so non-finite values are written as zero.
fn float(v: f32) -> String {
    if v.is_finite() {
        format!("{}", v)
    } else {
        "0".to_string()
    }
}

fn tuple(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| float(*v)).collect();
    format!("({})", parts.join(", "))
}
