use nalgebra::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution as Sampler;
use std::f64::consts::PI;
use probgraph::*;
use probgraph::config::Config;
use probgraph::fit::Fitter;
use probgraph::graph::{Feed, Op, Session};
use probgraph::model::registry;

const EPS : f64 = 10E-8;

fn normal_logp(x : f64, mu : f64, sigma : f64) -> f64 {
    -0.5 * ((x - mu) / sigma).powi(2) - sigma.ln() - 0.5 * (2. * PI).ln()
}

fn data(xs : &[f64]) -> DVector<f64> {
    DVector::from_column_slice(xs)
}

fn gaussian_sample(n : usize, mu : f64, sigma : f64, seed : u64) -> DVector<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let gen = rand_distr::Normal::new(mu, sigma).unwrap();
    DVector::from_iterator(n, (0..n).map(|_| gen.sample(&mut rng) ))
}

/// mu ~ Uniform(0, inf); x ~ Normal(mu, 1)
fn location_model(name : &str) -> (Model, Node, Node) {
    let mut model = Model::new(Some(name));
    let (mu, x) = model.enter(|| {
        let mu = Uniform::new(Some("mu"), Some(0.0), None)?;
        let x = Normal::new(Some("x"), &mu, 1.0)?;
        Ok((mu, x))
    }).unwrap();
    (model, mu, x)
}

#[test]
fn components_follow_creation_order() {
    let mut model = Model::new(Some("order"));
    let nodes = model.enter(|| {
        let a = Normal::new(Some("a"), 0.0, 1.0)?;
        let b = Normal::new(None, &a, 1.0)?;
        let c = Exponential::new(None, 2.0)?;
        let d = Uniform::new(None, Some(-1.0), Some(1.0))?;
        Ok(vec![a, b, c, d])
    }).unwrap();
    assert!(model.is_closed());
    assert!(!model.is_open());
    assert_eq!(model.components(), nodes);
    assert_eq!(nodes[0].name(), "a");
    assert!(nodes[2].name().starts_with("Exponential_"));
}

#[test]
fn nesting_fails() {
    let mut outer = Model::new(None);
    let mut inner = Model::new(None);
    outer.enter(|| {
        assert!(matches!(inner.open(), Err(ModelError::Nesting)));
        Normal::new(None, 0.0, 1.0)?;
        assert!(matches!(inner.enter(|| Ok(()) ), Err(ModelError::Nesting)));
        Ok(())
    }).unwrap();
    assert_eq!(outer.components().len(), 1);
    assert!(inner.components().is_empty());

    // Once closed, either model can be opened again.
    inner.open().unwrap().close().unwrap();
}

#[test]
fn nodes_require_open_model() {
    assert!(matches!(Normal::new(None, 0.0, 1.0), Err(ModelError::NoActiveModel)));
    assert!(matches!(Uniform::new(None, None, None), Err(ModelError::NoActiveModel)));
    assert!(matches!(registry::current(), Err(ModelError::NoActiveModel)));
    let mut model = Model::new(None);
    model.enter(|| Ok(()) ).unwrap();
    assert!(matches!(Exponential::new(None, 1.0), Err(ModelError::NoActiveModel)));
}

#[test]
fn scope_closes_on_every_exit_path() {
    let mut model = Model::new(None);
    {
        let _guard = model.open().unwrap();
        Normal::new(Some("y"), 0.0, 1.0).unwrap();
    }
    assert!(!registry::is_open());
    assert!(model.is_closed());

    let mut failing = Model::new(None);
    let res : Result<(), ModelError> = failing.enter(|| {
        Normal::new(None, 0.0, 1.0)?;
        Err(ModelError::InvalidArgument(String::from("failure inside the model")))
    });
    assert!(matches!(res, Err(ModelError::InvalidArgument(_))));
    assert!(!registry::is_open());
    assert!(failing.is_closed());
}

#[test]
fn parameters_from_another_model_are_rejected() {
    let mut first = Model::new(None);
    let a = first.enter(|| Normal::new(Some("a"), 0.0, 1.0) ).unwrap();
    let mut second = Model::new(None);
    let res = second.enter(|| Normal::new(None, &a, 1.0) );
    assert!(matches!(res, Err(ModelError::InvalidArgument(_))));
    assert!(matches!(Model::new(None).enter(|| Uniform::new(None, Some(1.0), Some(1.0)) ), Err(ModelError::InvalidArgument(_))));
}

#[test]
fn observed_preconditions() {
    let (mut model, mu, x) = location_model("preconditions");
    let mut other = Model::new(None);
    let foreign = other.enter(|| Normal::new(None, 0.0, 1.0) ).unwrap();

    assert!(matches!(model.observed(&[]), Err(ModelError::InvalidArgument(_))));
    assert!(matches!(model.observed(&[&x, &x]), Err(ModelError::InvalidArgument(_))));
    assert!(matches!(model.observed(&[&foreign]), Err(ModelError::InvalidArgument(_))));

    // Any open model makes observed() fail.
    let mut open = Model::new(None);
    let guard = open.open().unwrap();
    assert!(matches!(model.observed(&[&x]), Err(ModelError::WrongScope)));
    guard.close().unwrap();

    let mut never_closed = Model::new(None);
    assert!(matches!(never_closed.observed(&[&x]), Err(ModelError::NotClosed(_))));

    model.observed(&[&x, &mu]).unwrap();
    assert_eq!(model.hidden().unwrap().len(), 0);
}

#[test]
fn split_is_a_partition() {
    let mut model = Model::new(Some("split"));
    let nodes = model.enter(|| {
        let a = Normal::new(Some("a"), 0.0, 1.0)?;
        let b = Normal::new(Some("b"), &a, 1.0)?;
        let c = Normal::new(Some("c"), &b, 2.0)?;
        let d = Exponential::new(Some("d"), 1.0)?;
        let e = Uniform::new(Some("e"), Some(-1.0), Some(1.0))?;
        Ok(vec![a, b, c, d, e])
    }).unwrap();

    for mask in 1..(1usize << nodes.len()) {
        let observed : Vec<&Node> = nodes.iter().enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0 )
            .map(|(_, n)| n )
            .collect();
        model.observed(&observed[..]).unwrap();
        let hidden = model.hidden().unwrap();
        for h in hidden.iter() {
            assert!(!observed.contains(&h));
        }
        let expected_hidden : Vec<Node> = nodes.iter()
            .filter(|n| !observed.contains(n) )
            .cloned()
            .collect();
        assert_eq!(hidden, &expected_hidden[..]);
        assert_eq!(hidden.len() + observed.len(), nodes.len());
        assert_eq!(model.observed_nodes().unwrap().len(), observed.len());
        assert_eq!(model.bindings().unwrap().len(), nodes.len());
    }
}

#[test]
fn rewrite_replaces_nodes_by_name() {
    let (mut model, mu, x) = location_model("rewrite");
    let snapshot = model.snapshot().unwrap().clone();
    assert!(snapshot.node("rewrite/Neg").is_some());
    assert!(matches!(snapshot.node("mu").unwrap().op, Op::Placeholder{ .. }));

    model.observed(&[&x]).unwrap();
    assert_eq!(model.nll_expr().unwrap().name(), "rewrite/Neg");
    let params = model.hidden_params().unwrap();
    let inputs = model.observed_inputs().unwrap();
    assert_eq!(params[0].name(), "mu");
    assert!(matches!(params[0].op(), Op::Variable{ .. }));
    assert_eq!(inputs[0].name(), "x");
    assert!(matches!(inputs[0].op(), Op::Placeholder{ .. }));

    let bindings = model.bindings().unwrap();
    assert_eq!(bindings.expr(&mu), Some(&params[0]));
    assert_eq!(bindings.node(&inputs[0]), Some(&x));

    // The rewrite never touches the snapshot.
    assert_eq!(model.snapshot().unwrap(), &snapshot);
    assert_eq!(model.context().unwrap().graph().node_count(), snapshot.len() + 2);
}

#[test]
fn observing_again_resets_hidden_values() {
    let (mut model, mu, x) = location_model("reset");
    model.observed(&[&x]).unwrap();
    model.assign(vec![(&mu, 2.0)]).unwrap();
    assert!((model.value(&mu).unwrap() - 2.0).abs() < EPS);
    let first = model.nll_expr().unwrap().clone();

    model.observed(&[&x]).unwrap();
    assert!(model.value(&mu).unwrap().abs() < EPS);
    assert!(!first.graph().same(model.nll_expr().unwrap().graph()));

    // Swapping the roles makes x the only hidden parameter.
    model.observed(&[&mu]).unwrap();
    assert_eq!(model.hidden().unwrap(), &[x.clone()]);
    assert!(matches!(model.value(&mu), Err(ModelError::InvalidArgument(_))));
    assert!(model.value(&x).unwrap().abs() < EPS);
    model.assign(vec![(&x, 1.5)]).unwrap();
    let nll = model.nll(&[data(&[0.5])]).unwrap();
    assert!((nll + normal_logp(1.5, 0.5, 1.0)).abs() < EPS);
}

#[test]
fn argument_count_must_match() {
    let (mut model, _mu, x) = location_model("arguments");
    assert!(matches!(model.nll(&[data(&[1.0])]), Err(ModelError::NotObserved)));
    assert!(matches!(model.fit(&[data(&[1.0])]), Err(ModelError::NotObserved)));
    model.observed(&[&x]).unwrap();
    assert!(matches!(model.pdf(&[]), Err(ModelError::ArgumentMismatch{ given : 0, expected : 1 })));
    assert!(matches!(
        model.nll(&[data(&[1.0]), data(&[2.0])]),
        Err(ModelError::ArgumentMismatch{ given : 2, expected : 1 })
    ));
    assert!(matches!(model.fit(&[]), Err(ModelError::ArgumentMismatch{ .. })));
}

#[test]
fn nll_is_negative_logp() {
    let mut model = Model::new(None);
    let x = model.enter(|| Normal::new(Some("x"), 1.0, 2.0) ).unwrap();
    model.observed(&[&x]).unwrap();
    for p in [-3.0, 0.0, 1.0, 2.5].iter() {
        let nll = model.nll(&[data(&[*p])]).unwrap();
        assert!((nll + normal_logp(*p, 1.0, 2.0)).abs() < EPS);
    }
    let sample = data(&[-1.0, 0.5, 4.0]);
    let total : f64 = sample.iter().map(|p| normal_logp(*p, 1.0, 2.0) ).sum();
    assert!((model.nll(&[sample]).unwrap() + total).abs() < EPS);

    let mut model = Model::new(None);
    let u = model.enter(|| Uniform::new(Some("u"), Some(0.0), Some(4.0)) ).unwrap();
    model.observed(&[&u]).unwrap();
    for p in [1e-12, 2.0, 4.0 - 1e-12].iter() {
        assert!((model.nll(&[data(&[*p])]).unwrap() - 4f64.ln()).abs() < EPS);
    }
    assert!(model.nll(&[data(&[4.5])]).unwrap().is_infinite());

    let mut model = Model::new(None);
    let e = model.enter(|| Exponential::new(Some("e"), 2.0) ).unwrap();
    model.observed(&[&e]).unwrap();
    for p in [1e-12, 0.5, 3.0].iter() {
        let logp = 2f64.ln() - 2.0 * p;
        assert!((model.nll(&[data(&[*p])]).unwrap() + logp).abs() < EPS);
    }
    assert!(model.nll(&[data(&[-1e-12])]).unwrap().is_infinite());
}

#[test]
fn pdf_multiplies_observed_densities() {
    let mut model = Model::new(None);
    let (x, y) = model.enter(|| {
        let x = Normal::new(Some("x"), 0.0, 1.0)?;
        let y = Exponential::new(Some("y"), 1.0)?;
        Ok((x, y))
    }).unwrap();
    model.observed(&[&x]).unwrap();
    let pdf = model.pdf(&[data(&[0.0, 1.0])]).unwrap();
    assert_eq!(pdf.nrows(), 2);
    assert!((pdf[0] - 1. / (2. * PI).sqrt()).abs() < EPS);
    assert!((pdf[1] - normal_logp(1.0, 0.0, 1.0).exp()).abs() < EPS);

    model.observed(&[&y, &x]).unwrap();
    let pdf = model.pdf(&[data(&[1.0]), data(&[0.0])]).unwrap();
    assert!((pdf[0] - (-1f64).exp() / (2. * PI).sqrt()).abs() < EPS);
}

#[test]
fn cdf_is_optional() {
    let mut model = Model::new(None);
    let (n, c) = model.enter(|| {
        let n = Normal::new(None, 0.0, 1.0)?;
        let u = Uniform::new(None, Some(0.0), Some(2.0))?;
        let c = u.cdf(0.5)?;
        Ok((n, c))
    }).unwrap();
    assert!(matches!(n.cdf(0.0), Err(ModelError::NotImplemented{ op : "cdf", kind : "Normal" })));
    let sess = Session::new(c.graph().clone());
    assert!((sess.run_scalar(&c, &Feed::new()).unwrap() - 0.25).abs() < EPS);

    let mut model = Model::new(None);
    let (flat, rate) = model.enter(|| {
        let flat = Uniform::new(None, Some(0.0), None)?;
        let rate = Exponential::new(None, 2.0)?;
        Ok((flat, rate))
    }).unwrap();
    assert!(matches!(flat.cdf(1.0), Err(ModelError::NotImplemented{ .. })));
    let c = rate.cdf(1.0).unwrap();
    let sess = Session::new(c.graph().clone());
    assert!((sess.run_scalar(&c, &Feed::new()).unwrap() - (1. - (-2f64).exp())).abs() < EPS);
}

#[test]
fn assign_changes_nll() {
    let mut model = Model::new(Some("assign"));
    let (mu, x) = model.enter(|| {
        let mu = Normal::new(Some("mu"), 0.0, 10.0)?;
        let x = Normal::new(Some("x"), &mu, 2.0)?;
        Ok((mu, x))
    }).unwrap();
    model.observed(&[&x]).unwrap();
    let sample = [0.5, 2.0, 3.0];

    let manual = |m : f64| -> f64 {
        -(normal_logp(m, 0.0, 10.0) + sample.iter().map(|p| normal_logp(*p, m, 2.0) ).sum::<f64>())
    };

    model.assign(vec![(&mu, 1.5)]).unwrap();
    assert!((model.nll(&[data(&sample)]).unwrap() - manual(1.5)).abs() < EPS);

    let param = model.hidden_params().unwrap()[0].clone();
    model.assign(vec![(&param, -1.0)]).unwrap();
    assert!((model.nll(&[data(&sample)]).unwrap() - manual(-1.0)).abs() < EPS);

    assert!(matches!(model.assign(Vec::<(&Node, f64)>::new()), Err(ModelError::InvalidArgument(_))));
    assert!(matches!(model.assign(vec![(&x, 1.0)]), Err(ModelError::InvalidArgument(_))));
    let input = model.observed_inputs().unwrap()[0].clone();
    assert!(matches!(model.assign(vec![(&input, 1.0)]), Err(ModelError::InvalidArgument(_))));
}

#[test]
fn fit_recovers_sample_mean() {
    let (mut model, mu, x) = location_model("location");
    model.observed(&[&x]).unwrap();
    let sample = gaussian_sample(200, 3.0, 1.0, 42);
    let mean = sample.mean();
    let res = model.fit(&[sample.clone()]).unwrap();
    println!("{}", res);
    assert!(res.success);
    assert!((res.x[0] - mean).abs() < 1E-4);
    assert!((model.value(&mu).unwrap() - res.x[0]).abs() < EPS);
    assert!((model.nll(&[sample]).unwrap() - res.fun).abs() < 1E-6);
}

#[test]
fn fit_without_hidden_nodes_evaluates_nll() {
    let mut model = Model::new(None);
    let x = model.enter(|| Normal::new(Some("x"), 0.0, 1.0) ).unwrap();
    model.observed(&[&x]).unwrap();
    let res = model.fit(&[data(&[1.0])]).unwrap();
    assert!(res.success);
    assert!(res.x.is_empty());
    assert!((res.fun + normal_logp(1.0, 0.0, 1.0)).abs() < EPS);
}

#[test]
fn bound_margin_follows_config() {
    let config = Config::load(r#"{ "bound_epsilon" : 0.5 }"#.as_bytes()).unwrap();
    let mut model = Model::with_config(Some("margin"), config);
    let (_mu, x) = model.enter(|| {
        let mu = Uniform::new(Some("mu"), Some(0.0), Some(2.0))?;
        let x = Normal::new(Some("x"), &mu, 1.0)?;
        Ok((mu, x))
    }).unwrap();
    model.observed(&[&x]).unwrap();
    let fitter = Fitter::new(model.context().unwrap(), model.config().bound_epsilon);
    let bounds = fitter.bounds().unwrap();
    assert_eq!(bounds[0].lower, Some(0.5));
    assert_eq!(bounds[0].upper, Some(1.5));
    assert_eq!(fitter.initial().unwrap(), vec![0.0]);
}

#[test]
fn untracked_nodes_leave_the_model() {
    let mut model = Model::new(Some("untrack"));
    let (a, b) = model.enter(|| {
        let a = Normal::new(Some("a"), 0.0, 1.0)?;
        let b = Normal::new(Some("b"), 0.0, 1.0)?;
        let scratch = Normal::new(None, 0.0, 1.0)?;
        registry::untrack(&scratch)?;
        Ok((a, b))
    }).unwrap();
    assert_eq!(model.components(), vec![a.clone(), b.clone()]);
    model.observed(&[&a]).unwrap();

    model.untrack_variable(&b).unwrap();
    assert_eq!(model.components(), vec![a.clone()]);
    assert!(model.hidden().is_none());
    assert!(matches!(model.observed(&[&b]), Err(ModelError::InvalidArgument(_))));
    assert!(matches!(model.untrack_variable(&b), Err(ModelError::InvalidArgument(_))));

    model.observed(&[&a]).unwrap();
    let nll = model.nll(&[data(&[0.3])]).unwrap();
    assert!((nll + normal_logp(0.3, 0.0, 1.0)).abs() < EPS);
}

#[test]
fn bindings_ignore_expressions_of_other_graphs() {
    let (mut model, mu, x) = location_model("stale_bindings");
    model.observed(&[&x]).unwrap();
    let old_input = model.observed_inputs().unwrap()[0].clone();
    let old_param = model.hidden_params().unwrap()[0].clone();

    // Same roles, so the new graph places x and mu at the same indices.
    model.observed(&[&x]).unwrap();
    let bindings = model.bindings().unwrap();
    assert_eq!(model.observed_inputs().unwrap()[0].index(), old_input.index());
    assert_eq!(bindings.node(&old_input), None);
    assert_eq!(bindings.node(&old_param), None);
    assert_eq!(bindings.node(&model.hidden_params().unwrap()[0]), Some(&mu));
    assert!(matches!(model.assign(vec![(&old_param, 1.0)]), Err(ModelError::InvalidArgument(_))));
}

#[test]
fn closing_again_reuses_the_likelihood() {
    let (mut model, _mu, x) = location_model("reclose");
    let first = model.snapshot().unwrap().clone();
    let nodes = model.components()[0].value().graph().node_count();

    model.open().unwrap().close().unwrap();
    assert_eq!(model.snapshot().unwrap(), &first);
    assert_eq!(model.components()[0].value().graph().node_count(), nodes);

    model.observed(&[&x]).unwrap();
    model.assign(vec![(&model.components()[0], 1.0)]).unwrap();
    let nll = model.nll(&[data(&[2.0])]).unwrap();
    assert!((nll + normal_logp(2.0, 1.0, 1.0)).abs() < EPS);

    // Adding a component rebuilds the likelihood over every component.
    let y = model.enter(|| Exponential::new(Some("y"), 1.0) ).unwrap();
    assert_eq!(model.components().len(), 3);
    model.observed(&[&x, &y]).unwrap();
    let nll = model.nll(&[data(&[0.0]), data(&[0.5])]).unwrap();
    assert!((nll + normal_logp(0.0, 0.0, 1.0) + (1f64.ln() - 0.5)).abs() < EPS);
}
