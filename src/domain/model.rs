//! Ridge regression over lag features, plus the binary artifact format used
//! to persist a trained model.
//!
//! # Artifact layout (little-endian)
//!
//! ```text
//! magic "GLRM" | version u16 | lag_depth u16 | alpha f64 | samples u32
//! | trained_at i64 (unix millis) | intercept f64 | coefficients f64 * lag_depth
//! | sha256 of everything above (32 bytes)
//! ```
//!
//! Coefficients are stored as raw IEEE-754 bits so a save/load cycle yields
//! bit-identical predictions.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{DomainError, LagRow, TrainingRow};

const ARTIFACT_MAGIC: &[u8; 4] = b"GLRM";
const ARTIFACT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 2 + 8 + 4 + 8 + 8;
const CHECKSUM_LEN: usize = 32;

/// Upper bound on lag depth accepted from an artifact.
const MAX_LAG_DEPTH: usize = 64;

/// Errors decoding a persisted model artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact truncated: {0} bytes")]
    Truncated(usize),

    #[error("Not a model artifact (bad magic)")]
    BadMagic,

    #[error("Unsupported artifact version {0}")]
    UnsupportedVersion(u16),

    #[error("Artifact checksum mismatch")]
    ChecksumMismatch,

    #[error("Invalid artifact contents: {0}")]
    Invalid(String),
}

/// A fitted linear model mapping a lag row to the next value.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeModel {
    coefficients: Vec<f64>,
    intercept: f64,
    alpha: f64,
    samples: usize,
    trained_at: DateTime<Utc>,
}

impl RidgeModel {
    /// Assemble a model from known parameters.
    ///
    /// # Errors
    /// Returns `DomainError::Numeric` if any parameter is not finite or there
    /// are no coefficients.
    pub fn from_parts(coefficients: Vec<f64>, intercept: f64, alpha: f64) -> Result<Self, DomainError> {
        if coefficients.is_empty() || coefficients.len() > MAX_LAG_DEPTH {
            return Err(DomainError::Numeric(format!(
                "model needs 1..={MAX_LAG_DEPTH} coefficients, got {}",
                coefficients.len()
            )));
        }
        if !intercept.is_finite() || !alpha.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(DomainError::Numeric("model parameters must be finite".into()));
        }

        Ok(Self {
            coefficients,
            intercept,
            alpha,
            samples: 0,
            trained_at: Utc::now(),
        })
    }

    /// Fit an L2-regularized linear regression with an unpenalized intercept.
    ///
    /// Features and targets are centered, the coefficients solve
    /// `(XᵀX + αI) w = Xᵀy`, and `intercept = ȳ - x̄·w`.
    ///
    /// # Errors
    /// - `DomainError::EmptyTrainingSet` if `rows` is empty
    /// - `DomainError::Numeric` if rows disagree in width or the system is singular
    pub fn fit(rows: &[TrainingRow], alpha: f64) -> Result<Self, DomainError> {
        let first = rows.first().ok_or(DomainError::EmptyTrainingSet)?;
        let p = first.features.lags.len();
        if rows.iter().any(|r| r.features.lags.len() != p) {
            return Err(DomainError::Numeric("training rows differ in width".into()));
        }

        let n = rows.len() as f64;
        let mut x_mean = vec![0.0; p];
        let mut y_mean = 0.0;
        for row in rows {
            for (m, x) in x_mean.iter_mut().zip(&row.features.lags) {
                *m += x / n;
            }
            y_mean += row.target / n;
        }

        // Normal equations on centered data.
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for row in rows {
            let xc: Vec<f64> = row
                .features
                .lags
                .iter()
                .zip(&x_mean)
                .map(|(x, m)| x - m)
                .collect();
            let yc = row.target - y_mean;
            for j in 0..p {
                rhs[j] += xc[j] * yc;
                for k in 0..p {
                    gram[j][k] += xc[j] * xc[k];
                }
            }
        }
        for (j, row) in gram.iter_mut().enumerate() {
            row[j] += alpha;
        }

        let coefficients = solve(gram, rhs)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        let mut model = Self::from_parts(coefficients, intercept, alpha)?;
        model.samples = rows.len();
        Ok(model)
    }

    /// Predict the next value for a lag row.
    ///
    /// # Errors
    /// Returns `DomainError::Numeric` if the row width does not match the model.
    pub fn predict(&self, row: &LagRow) -> Result<f64, DomainError> {
        if row.lags.len() != self.coefficients.len() {
            return Err(DomainError::Numeric(format!(
                "model expects {} lags, got {}",
                self.coefficients.len(),
                row.lags.len()
            )));
        }

        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(&row.lags)
                .map(|(w, x)| w * x)
                .sum::<f64>())
    }

    #[must_use]
    pub fn lag_depth(&self) -> usize {
        self.coefficients.len()
    }

    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of rows the model was fitted on (0 if assembled from parts).
    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Serialize to the artifact format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(HEADER_LEN + 8 * self.coefficients.len() + CHECKSUM_LEN);
        out.extend_from_slice(ARTIFACT_MAGIC);
        out.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.coefficients.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.alpha.to_le_bytes());
        out.extend_from_slice(&(self.samples.min(u32::MAX as usize) as u32).to_le_bytes());
        out.extend_from_slice(&self.trained_at.timestamp_millis().to_le_bytes());
        out.extend_from_slice(&self.intercept.to_le_bytes());
        for c in &self.coefficients {
            out.extend_from_slice(&c.to_le_bytes());
        }
        let checksum = Sha256::digest(&out);
        out.extend_from_slice(&checksum);
        out
    }

    /// Deserialize from the artifact format, verifying the checksum.
    ///
    /// # Errors
    /// Returns an `ArtifactError` describing why the bytes are unusable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(ArtifactError::Truncated(bytes.len()));
        }
        if &bytes[0..4] != ARTIFACT_MAGIC {
            return Err(ArtifactError::BadMagic);
        }

        let mut cursor = Cursor::new(&bytes[4..]);
        let version = cursor.u16()?;
        if version != ARTIFACT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }
        let depth = cursor.u16()? as usize;
        if depth == 0 || depth > MAX_LAG_DEPTH {
            return Err(ArtifactError::Invalid(format!("lag depth {depth}")));
        }

        let body_len = HEADER_LEN + 8 * depth;
        if bytes.len() != body_len + CHECKSUM_LEN {
            return Err(ArtifactError::Truncated(bytes.len()));
        }
        if Sha256::digest(&bytes[..body_len]).as_slice() != &bytes[body_len..] {
            return Err(ArtifactError::ChecksumMismatch);
        }

        let alpha = cursor.f64()?;
        let samples = cursor.u32()? as usize;
        let trained_millis = cursor.i64()?;
        let intercept = cursor.f64()?;
        let coefficients = (0..depth).map(|_| cursor.f64()).collect::<Result<Vec<_>, _>>()?;

        let trained_at = DateTime::from_timestamp_millis(trained_millis)
            .ok_or_else(|| ArtifactError::Invalid(format!("timestamp {trained_millis}")))?;

        let mut model = Self::from_parts(coefficients, intercept, alpha)
            .map_err(|e| ArtifactError::Invalid(e.to_string()))?;
        model.samples = samples;
        model.trained_at = trained_at;
        Ok(model)
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, DomainError> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(DomainError::Numeric(
                "singular system in ridge fit (alpha too small for collinear lags?)".into(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let pivot_rhs = b[col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (dst, src) in a[row][col..].iter_mut().zip(&pivot_row[col..]) {
                *dst -= factor * src;
            }
            b[row] -= factor * pivot_rhs;
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(DomainError::Numeric("non-finite ridge coefficients".into()));
    }
    Ok(x)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ArtifactError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(ArtifactError::Truncated(self.bytes.len()))?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(buf)
    }

    fn u16(&mut self) -> Result<u16, ArtifactError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, ArtifactError> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, ArtifactError> {
        self.take::<8>().map(i64::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64, ArtifactError> {
        self.take::<8>().map(f64::from_le_bytes)
    }
}
