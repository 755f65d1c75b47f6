use super::ply::{PlyError, VertexTable};

/// Zeroth-order spherical harmonics basis constant.
pub const SH_C0: f32 = 0.282_094_8;

const DEFAULT_LOG_SCALE: f32 = -4.6;
const OPAQUE_LOGIT: f32 = 10.0;

/// Gaussian splats as stored in a 3DGS PLY: log scales, opacity logits and raw SH coefficients.
#[derive(Debug, Clone, Default)]
pub struct Gaussians {
    pub positions: Vec<[f32; 3]>,
    pub sh_dc: Vec<[f32; 3]>,
    /// Higher-order SH coefficients, `rest_per_point()` values per gaussian in file order.
    pub sh_rest: Vec<f32>,
    pub sh_degree: u32,
    pub opacities: Vec<f32>,
    pub log_scales: Vec<[f32; 3]>,
    /// Quaternions as `[w, x, y, z]`.
    pub rotations: Vec<[f32; 4]>,
}

impl Gaussians {
    /// Build gaussians from a vertex table. With `zero_order_sh` only the DC colour term is kept.
    pub fn from_vertices(table: &VertexTable, zero_order_sh: bool) -> Result<Self, PlyError> {
        let col = |name: &str| table.column(name);
        let require =
            |name: &str| col(name).ok_or_else(|| PlyError::MissingProperty(name.to_string()));

        let xyz = [require("x")?, require("y")?, require("z")?];
        let dc = triple(&col, ["f_dc_0", "f_dc_1", "f_dc_2"]);
        let rgb = triple(&col, ["red", "green", "blue"]);
        let scale = triple(&col, ["scale_0", "scale_1", "scale_2"]);
        let rot = match (col("rot_0"), col("rot_1"), col("rot_2"), col("rot_3")) {
            (Some(w), Some(x), Some(y), Some(z)) => Some([w, x, y, z]),
            _ => None,
        };
        let opacity = col("opacity");

        let (sh_degree, rest_cols) = if zero_order_sh {
            (0, Vec::new())
        } else {
            rest_columns(table)?
        };

        let n = table.rows;
        let mut gaussians = Gaussians {
            positions: Vec::with_capacity(n),
            sh_dc: Vec::with_capacity(n),
            sh_rest: Vec::with_capacity(n * rest_cols.len()),
            sh_degree,
            opacities: Vec::with_capacity(n),
            log_scales: Vec::with_capacity(n),
            rotations: Vec::with_capacity(n),
        };

        for row in 0..n {
            let get = |c: usize| table.get(row, c);
            gaussians.positions.push(xyz.map(get));

            let dc = match (dc, rgb) {
                (Some(dc), _) => dc.map(get),
                (None, Some(rgb)) => rgb.map(|c| (get(c) / 255.0 - 0.5) / SH_C0),
                (None, None) => [0.0; 3],
            };
            gaussians.sh_dc.push(dc);
            gaussians.sh_rest.extend(rest_cols.iter().map(|&c| get(c)));
            gaussians
                .opacities
                .push(opacity.map(get).unwrap_or(OPAQUE_LOGIT));
            gaussians
                .log_scales
                .push(scale.map(|s| s.map(get)).unwrap_or([DEFAULT_LOG_SCALE; 3]));
            gaussians
                .rotations
                .push(rot.map(|r| r.map(get)).unwrap_or([1.0, 0.0, 0.0, 0.0]));
        }

        Ok(gaussians)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn rest_per_point(&self) -> usize {
        rest_count(self.sh_degree)
    }

    /// Base colour from the DC term, clamped to `[0, 1]`.
    pub fn color(&self, i: usize) -> [f32; 3] {
        self.sh_dc[i].map(|c| (0.5 + SH_C0 * c).clamp(0.0, 1.0))
    }

    pub fn opacity(&self, i: usize) -> f32 {
        1.0 / (1.0 + (-self.opacities[i]).exp())
    }

    pub fn scale(&self, i: usize) -> [f32; 3] {
        self.log_scales[i].map(f32::exp)
    }

    pub fn rotation(&self, i: usize) -> [f32; 4] {
        let q = self.rotations[i];
        let norm = q.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON && norm.is_finite() {
            q.map(|v| v / norm)
        } else {
            [1.0, 0.0, 0.0, 0.0]
        }
    }

    /// Axis-aligned bounds of the finite positions.
    pub fn extent(&self) -> Option<([f32; 3], [f32; 3])> {
        self.positions
            .iter()
            .filter(|p| p.iter().all(|v| v.is_finite()))
            .fold(None, |acc, p| {
                let (mut min, mut max) = acc.unwrap_or((*p, *p));
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
                Some((min, max))
            })
    }
}

fn triple<F>(col: &F, names: [&str; 3]) -> Option<[usize; 3]>
where
    F: Fn(&str) -> Option<usize>,
{
    Some([col(names[0])?, col(names[1])?, col(names[2])?])
}

/// Number of non-DC coefficients for an SH degree, over three colour channels.
fn rest_count(degree: u32) -> usize {
    let per_channel = (degree as usize + 1).pow(2) - 1;
    per_channel * 3
}

fn rest_columns(table: &VertexTable) -> Result<(u32, Vec<usize>), PlyError> {
    let count = table
        .names
        .iter()
        .filter(|n| n.starts_with("f_rest_"))
        .count();

    let degree = (0..=4)
        .find(|&d| rest_count(d) == count)
        .ok_or_else(|| {
            PlyError::MissingProperty(format!(
                "f_rest_* ({} coefficients do not match any SH degree)",
                count
            ))
        })?;

    let columns = (0..count)
        .map(|i| {
            let name = format!("f_rest_{}", i);
            table.column(&name).ok_or(PlyError::MissingProperty(name))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((degree, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[&str], rows: &[Vec<f32>]) -> VertexTable {
        VertexTable {
            names: names.iter().map(|n| n.to_string()).collect(),
            rows: rows.len(),
            data: rows.iter().flat_map(|r| r.iter().copied()).collect(),
        }
    }

    fn splat_names(rest: usize) -> Vec<String> {
        let mut names: Vec<String> = ["x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend((0..rest).map(|i| format!("f_rest_{}", i)));
        names.extend(
            [
                "opacity", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        names
    }

    #[test]
    fn keeps_higher_order_sh_when_not_forced() {
        let names = splat_names(9);
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let mut row = vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        row.extend((0..9).map(|i| i as f32));
        row.extend([0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        let g = Gaussians::from_vertices(&table(&names, &[row]), false).unwrap();

        assert_eq!(g.sh_degree, 1);
        assert_eq!(g.rest_per_point(), 9);
        assert_eq!(g.sh_rest[8], 8.0);
        assert_eq!(g.rotation(0), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(g.opacity(0), 0.5);
        assert_eq!(g.scale(0), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn zero_order_drops_rest_coefficients() {
        let names = splat_names(45);
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let row = vec![0.5; names.len()];
        let g = Gaussians::from_vertices(&table(&names, &[row.clone(), row]), true).unwrap();

        assert_eq!(g.len(), 2);
        assert!(!g.is_empty());
        assert_eq!(g.sh_degree, 0);
        assert!(g.sh_rest.is_empty());
    }

    #[test]
    fn inconsistent_rest_count_is_rejected() {
        let names = splat_names(5);
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let row = vec![0.0; names.len()];
        let err = Gaussians::from_vertices(&table(&names, &[row]), false).unwrap_err();
        assert!(matches!(err, PlyError::MissingProperty(_)));
    }

    #[test]
    fn plain_point_cloud_uses_rgb_and_defaults() {
        let t = table(
            &["x", "y", "z", "red", "green", "blue"],
            &[vec![0.0, 0.0, 0.0, 255.0, 0.0, 127.5]],
        );
        let g = Gaussians::from_vertices(&t, false).unwrap();
        let c = g.color(0);
        assert!((c[0] - 1.0).abs() < 1e-5);
        assert!(c[1].abs() < 1e-5);
        assert!((c[2] - 0.5).abs() < 1e-5);
        assert!(g.opacity(0) > 0.999);
        assert_eq!(g.sh_degree, 0);
    }

    #[test]
    fn missing_position_is_an_error() {
        let t = table(&["x", "y"], &[vec![0.0, 0.0]]);
        let err = Gaussians::from_vertices(&t, true).unwrap_err();
        assert!(matches!(err, PlyError::MissingProperty(p) if p == "z"));
    }

    #[test]
    fn extent_skips_non_finite_positions() {
        let t = table(
            &["x", "y", "z"],
            &[
                vec![1.0, -2.0, 3.0],
                vec![f32::NAN, 0.0, 0.0],
                vec![-1.0, 4.0, 0.5],
            ],
        );
        let g = Gaussians::from_vertices(&t, true).unwrap();
        assert_eq!(g.extent(), Some(([-1.0, -2.0, 0.5], [1.0, 4.0, 3.0])));
    }
}
