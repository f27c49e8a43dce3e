use serde::{Deserialize, Serialize};

/// Left/right hand designation reported by the sensing subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chirality {
    Left,
    Right,
}

impl Chirality {
    pub const fn count() -> usize {
        2
    }

    pub const fn ordered() -> [Chirality; 2] {
        [Chirality::Left, Chirality::Right]
    }

    pub const fn index(self) -> usize {
        match self {
            Chirality::Left => 0,
            Chirality::Right => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Chirality::Left => "left",
            Chirality::Right => "right",
        }
    }
}

/// World-space rigid transform stored as a row-major 4x4 homogeneous matrix
/// (column-vector convention: translation lives in the last column).
///
/// Poses are immutable values; every anchor update replaces them wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    matrix: [[f32; 4]; 4],
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const fn from_matrix(matrix: [[f32; 4]; 4]) -> Self {
        Self { matrix }
    }

    pub const fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            matrix: [
                [1.0, 0.0, 0.0, translation[0]],
                [0.0, 1.0, 0.0, translation[1]],
                [0.0, 0.0, 1.0, translation[2]],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub const fn matrix(&self) -> &[[f32; 4]; 4] {
        &self.matrix
    }

    /// Matrix product `self * local`: maps a pose expressed in this pose's
    /// local frame into the frame this pose is expressed in. A fingertip's
    /// world pose is `hand_anchor.compose(&joint_local)`.
    pub fn compose(&self, local: &Pose) -> Pose {
        let mut out = [[0.0f32; 4]; 4];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, cell) in out_row.iter_mut().enumerate() {
                *cell = (0..4)
                    .map(|k| self.matrix[row][k] * local.matrix[k][col])
                    .sum();
            }
        }
        Pose { matrix: out }
    }

    pub const fn translation(&self) -> [f32; 3] {
        [self.matrix[0][3], self.matrix[1][3], self.matrix[2][3]]
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}
