use crate::core::utils::quaternion::{left_representation, pure, right_representation};
use nalgebra::{DMatrix, Matrix4, Point3};

/// Match-independent quaternion products for every (reactant atom, product atom) pair.
///
/// For reactant position `y` and product position `x` the squared residual of the transform
/// `(s, r)` is `|(Q(y) - W(x)) r - s|^2`, so the alignment sums only ever need `Q(y)^T W(x)` and
/// `W(x) - Q(y)`. Both are stored row-major by reactant atom.
#[derive(Debug, Clone)]
pub struct AtomInteractions {
    num_reactants: usize,
    num_products: usize,
    cross: Vec<Matrix4<f64>>,
    differences: Vec<Matrix4<f64>>,
}

/// Weighted sums of one reactant-group/product-group block of the match matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTerms {
    /// `-2 sum m Q(y)^T W(x)`
    pub c1: Matrix4<f64>,
    /// `sum m`
    pub c2: f64,
    /// `2 sum m (W(x) - Q(y))`
    pub c3: Matrix4<f64>,
    /// `2 sum m max|Q(y)^T W(x)|`, the size of `C1` before its terms cancel.
    pub magnitude: f64,
}

impl AtomInteractions {
    pub fn new(reactant_positions: &[Point3<f64>], product_positions: &[Point3<f64>]) -> Self {
        let right: Vec<Matrix4<f64>> = reactant_positions
            .iter()
            .map(|y| right_representation(&pure(&y.coords)))
            .collect();
        let left: Vec<Matrix4<f64>> = product_positions
            .iter()
            .map(|x| left_representation(&pure(&x.coords)))
            .collect();

        let capacity = right.len() * left.len();
        let mut cross = Vec::with_capacity(capacity);
        let mut differences = Vec::with_capacity(capacity);
        for q in &right {
            for w in &left {
                cross.push(q.transpose() * w);
                differences.push(w - q);
            }
        }

        Self {
            num_reactants: right.len(),
            num_products: left.len(),
            cross,
            differences,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_reactants, self.num_products)
    }

    #[inline]
    fn index(&self, reactant: usize, product: usize) -> usize {
        reactant * self.num_products + product
    }

    /// `Q(y_reactant)^T W(x_product)`
    pub fn cross(&self, reactant: usize, product: usize) -> &Matrix4<f64> {
        &self.cross[self.index(reactant, product)]
    }

    /// `W(x_product) - Q(y_reactant)`
    pub fn difference(&self, reactant: usize, product: usize) -> &Matrix4<f64> {
        &self.differences[self.index(reactant, product)]
    }

    pub fn block_terms(
        &self,
        reactant_atoms: &[usize],
        product_atoms: &[usize],
        matches: &DMatrix<f64>,
    ) -> BlockTerms {
        let mut c1 = Matrix4::zeros();
        let mut c2 = 0.0;
        let mut c3 = Matrix4::zeros();
        let mut magnitude = 0.0;
        for &i in reactant_atoms {
            for &j in product_atoms {
                let weight = matches[(i, j)];
                if weight == 0.0 {
                    continue;
                }
                let cross = self.cross(i, j);
                c1 += cross * weight;
                magnitude += weight.abs() * cross.amax();
                c2 += weight;
                c3 += self.difference(i, j) * weight;
            }
        }
        BlockTerms {
            c1: c1 * -2.0,
            c2,
            c3: c3 * 2.0,
            magnitude: 2.0 * magnitude,
        }
    }
}

impl BlockTerms {
    /// `C3^T C3 / (4 C2) - C1`; its top eigenvector is the optimal rotation of the block.
    ///
    /// Symmetric in exact arithmetic. Callers must reject `c2 == 0` first.
    pub fn system_matrix(&self) -> Matrix4<f64> {
        self.c3.transpose() * self.c3 / (4.0 * self.c2) - self.c1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Quaternion, Vector4};

    fn hamilton(a: &Vector4<f64>, b: &Vector4<f64>) -> Vector4<f64> {
        (Quaternion::from_vector(*a) * Quaternion::from_vector(*b)).coords
    }

    #[test]
    fn pair_matrices_express_the_residual_quaternion() {
        let y = Point3::new(0.3, -1.2, 2.0);
        let x = Point3::new(-0.7, 0.4, 1.1);
        let interactions = AtomInteractions::new(&[y], &[x]);
        let r = Vector4::new(0.1, 0.2, -0.3, 0.9).normalize();

        // (W(x) - Q(y)) r = r x - y r
        let lhs = interactions.difference(0, 0) * r;
        let rhs = hamilton(&r, &pure(&x.coords)) - hamilton(&pure(&y.coords), &r);
        assert!((lhs - rhs).norm() < 1e-12);
    }

    #[test]
    fn cross_products_are_symmetric() {
        let interactions = AtomInteractions::new(
            &[Point3::new(1.0, 2.0, 3.0)],
            &[Point3::new(-2.0, 0.5, 4.0)],
        );
        let cross = interactions.cross(0, 0);
        assert!((cross - cross.transpose()).amax() < 1e-12);
    }

    #[test]
    fn block_terms_sum_only_the_selected_block() {
        let reactants = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let products = [Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 0.0, 1.0)];
        let interactions = AtomInteractions::new(&reactants, &products);
        let matches = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);

        let terms = interactions.block_terms(&[1], &[0, 1], &matches);
        assert_eq!(interactions.shape(), (2, 2));
        assert!((terms.c2 - 7.0).abs() < 1e-12);

        let expected_c3 =
            (interactions.difference(1, 0) * 3.0 + interactions.difference(1, 1) * 4.0) * 2.0;
        assert!((terms.c3 - expected_c3).amax() < 1e-12);
        let system = terms.system_matrix();
        assert!((system - system.transpose()).amax() < 1e-9);
    }
}
