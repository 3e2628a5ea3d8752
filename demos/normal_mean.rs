use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution as Sampler;
use probgraph::*;

// Estimates the location of normally-distributed data with unit scale,
// with the location restricted to the positive half-line. The estimate
// should match the sample mean.
fn main() -> Result<(), ModelError> {
    let mut rng = StdRng::seed_from_u64(1);
    let gen = rand_distr::Normal::new(2.5, 1.0).map_err(|e| ModelError::InvalidArgument(e.to_string()) )?;
    let sample = DVector::from_iterator(500, (0..500).map(|_| gen.sample(&mut rng) ));

    let mut model = Model::new(Some("normal_mean"));
    let (mu, x) = model.enter(|| {
        let mu = Uniform::new(Some("mu"), Some(0.0), None)?;
        let x = Normal::new(Some("x"), &mu, 1.0)?;
        Ok((mu, x))
    })?;
    model.observed(&[&x])?;

    let res = model.fit(&[sample.clone()])?;
    println!("{}", res);
    println!("mu = {} (sample mean = {})", model.value(&mu)?, sample.mean());
    println!("density at the first samples = {}", model.pdf(&[sample.rows(0, 3).into_owned()])?);
    Ok(())
}
