use nalgebra::DVector;

pub struct SimpleInterpolationUtils;
impl SimpleInterpolationUtils {
    pub fn linear_interpolation(start_point: &DVector<f64>,
                                end_point: &DVector<f64>,
                                mode: &LinearInterpolationMode) -> Vec<DVector<f64>> {
        let mut out_vec = vec![];

        match mode {
            LinearInterpolationMode::FixedNumKnots { num_knots } => {
                if *num_knots < 2 { out_vec.push(start_point.clone()); return out_vec; }
                let step = (end_point - start_point) / (*num_knots as f64 - 1.0);

                let mut curr_point = start_point.clone();
                for _ in 0..*num_knots-1 {
                    out_vec.push(curr_point.clone());
                    curr_point = &curr_point + &step;
                }
                out_vec.push(end_point.clone());
            }
        }

        out_vec
    }
    pub fn linear_interpolation_scalar(start: f64, end: f64, num_knots: usize) -> Vec<f64> {
        let res = Self::linear_interpolation(&DVector::from_element(1, start), &DVector::from_element(1, end), &LinearInterpolationMode::FixedNumKnots { num_knots });
        return res.iter().map(|v| v[0]).collect();
    }
}

pub enum LinearInterpolationMode {
    FixedNumKnots { num_knots: usize }
}
