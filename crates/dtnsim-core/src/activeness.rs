//! Interface activeness models
//!
//! An inactive interface neither scans nor accepts links. Models draw from
//! the run's RNG, so every call takes it explicitly.
//!
//! ## Models
//!
//! - [`ScheduledActiveness`]: fixed `[start, end]` windows (`activeTimes`)
//! - [`SmartphoneActiveness`]: alternating Weibull off-periods and
//!   exponential/Pareto usage sessions

use std::fmt::Debug;

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::{ConfigError, ConfigResult};
use crate::settings::Settings;

/// Setting naming the activeness model class
pub const ACTIVENESS_SETTING: &str = "activeness";
/// Setting listing active windows as `start,end,start,end,...`
pub const ACTIVE_TIMES_SETTING: &str = "activeTimes";

/// Predicate deciding whether an interface is switched on
pub trait Activeness: Debug {
    fn is_active(&mut self, now: f64, rng: &mut StdRng) -> bool;

    /// Fresh copy for another interface of the same group
    fn replicate(&self, rng: &mut StdRng) -> Box<dyn Activeness>;
}

/// Build the activeness model an interface namespace asks for
pub fn activeness_from_settings(
    settings: &Settings,
    rng: &mut StdRng,
) -> ConfigResult<Option<Box<dyn Activeness>>> {
    if settings.contains(ACTIVENESS_SETTING) {
        let class = settings.get(ACTIVENESS_SETTING)?;
        return match class.rsplit('.').next().unwrap_or(class) {
            "SmartphoneActiveness" => Ok(Some(Box::new(SmartphoneActiveness::from_settings(
                settings, rng,
            )?))),
            "ScheduledActiveness" | "ActivenessHandler" => {
                Ok(Some(Box::new(ScheduledActiveness::from_settings(settings)?)))
            }
            other => Err(ConfigError::UnknownClass {
                kind: "activeness model",
                name: other.to_string(),
            }),
        };
    }
    if settings.contains(ACTIVE_TIMES_SETTING) {
        return Ok(Some(Box::new(ScheduledActiveness::from_settings(settings)?)));
    }
    Ok(None)
}

/// Active only inside configured time windows
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledActiveness {
    windows: Vec<(f64, f64)>,
}

impl ScheduledActiveness {
    pub fn new(mut windows: Vec<(f64, f64)>) -> Self {
        windows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { windows }
    }

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let raw = settings.get_csv_f64(ACTIVE_TIMES_SETTING, None)?;
        if raw.len() % 2 != 0 {
            return Err(ConfigError::InvalidValue {
                key: settings.full_key(ACTIVE_TIMES_SETTING),
                value: format!("{raw:?}"),
                reason: "expected start,end pairs".to_string(),
            });
        }
        let windows = raw.chunks(2).map(|w| (w[0], w[1])).collect();
        Ok(Self::new(windows))
    }

    fn contains(&self, now: f64) -> bool {
        self.windows.iter().any(|&(s, e)| now >= s && now <= e)
    }
}

impl Activeness for ScheduledActiveness {
    fn is_active(&mut self, now: f64, _rng: &mut StdRng) -> bool {
        self.contains(now)
    }

    fn replicate(&self, _rng: &mut StdRng) -> Box<dyn Activeness> {
        Box::new(self.clone())
    }
}

const DEFAULT_PARETO_XM: f64 = 60.0;
const DEFAULT_MAX_SESSION: f64 = 12_000.0;

/// Population parameters of the smartphone usage model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartphoneParams {
    /// Probability a session length is exponential rather than Pareto
    pub r: f64,
    pub weibull_alpha: f64,
    pub weibull_beta: f64,
    pub exp_lambda: f64,
    pub pareto_alpha: f64,
    pub pareto_xm: f64,
    pub max_session: f64,
}

impl SmartphoneParams {
    /// Parameters drawn from the population-wide distributions
    pub fn draw(rng: &mut StdRng, max_session: f64) -> Self {
        Self {
            r: rng.random::<f64>() * 0.65 + 0.25,
            weibull_alpha: rng.random::<f64>() * 590.0 + 10.0,
            weibull_beta: rng.random::<f64>() * 0.2 + 0.3,
            exp_lambda: rng.random::<f64>() * 0.2999 + 0.0001,
            pareto_alpha: gaussian(rng) * 0.4 + 0.2,
            pareto_xm: DEFAULT_PARETO_XM,
            max_session,
        }
    }
}

/// Alternating off/on periods modelling phone usage sessions
#[derive(Debug, Clone)]
pub struct SmartphoneActiveness {
    params: SmartphoneParams,
    uniform_population: bool,
    start: f64,
    end: f64,
}

impl SmartphoneActiveness {
    pub fn new(params: SmartphoneParams, uniform_population: bool, rng: &mut StdRng) -> Self {
        let mut model = Self {
            params,
            uniform_population,
            start: 0.0,
            end: 0.0,
        };
        model.start = model.next_off_period(rng);
        model.end = model.start + model.next_duration(rng);
        model
    }

    /// Read overrides from settings; unset parameters are drawn
    pub fn from_settings(settings: &Settings, rng: &mut StdRng) -> ConfigResult<Self> {
        let max_session = settings.get_f64_or("maxSessionLength", DEFAULT_MAX_SESSION)?;
        let mut p = SmartphoneParams::draw(rng, max_session);
        p.pareto_xm = settings.get_f64_or("paretoXm", p.pareto_xm)?;
        p.pareto_alpha = settings.get_f64_or("paretoAlpha", p.pareto_alpha)?;
        p.exp_lambda = settings.get_f64_or("expLambda", p.exp_lambda)?;
        p.r = settings.get_f64_or("R", p.r)?;
        p.weibull_alpha = settings.get_f64_or("weibullAlpha", p.weibull_alpha)?;
        p.weibull_beta = settings.get_f64_or("weibullBeta", p.weibull_beta)?;
        let uniform = settings.get_bool_or("populationUniformity", false)?;
        Ok(Self::new(p, uniform, rng))
    }

    pub fn params(&self) -> &SmartphoneParams {
        &self.params
    }

    fn next_off_period(&self, rng: &mut StdRng) -> f64 {
        let u = 1.0 - rng.random::<f64>();
        self.params.weibull_alpha * (-u.ln()).powf(1.0 / self.params.weibull_beta)
    }

    fn next_duration(&self, rng: &mut StdRng) -> f64 {
        if rng.random::<f64>() < self.params.r {
            let u = 1.0 - rng.random::<f64>();
            -u.ln() / self.params.exp_lambda
        } else {
            bounded_pareto(
                rng,
                self.params.pareto_alpha,
                self.params.pareto_xm,
                self.params.max_session,
            )
        }
    }
}

impl Activeness for SmartphoneActiveness {
    fn is_active(&mut self, now: f64, rng: &mut StdRng) -> bool {
        if now > self.end {
            self.start = now + self.next_off_period(rng);
            self.end = self.start + self.next_duration(rng);
        }
        now >= self.start
    }

    fn replicate(&self, rng: &mut StdRng) -> Box<dyn Activeness> {
        let params = if self.uniform_population {
            self.params
        } else {
            SmartphoneParams::draw(rng, self.params.max_session)
        };
        Box::new(SmartphoneActiveness::new(params, self.uniform_population, rng))
    }
}

/// Standard normal sample (Box-Muller)
pub fn gaussian(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Sample of a Pareto distribution truncated to `[xm, max]`
pub fn bounded_pareto(rng: &mut StdRng, alpha: f64, xm: f64, max: f64) -> f64 {
    // non-positive shapes come out of the population draw; clamp to a heavy tail
    let alpha = alpha.max(0.05);
    let u = rng.random::<f64>();
    let la = xm.powf(alpha);
    let ha = max.powf(alpha);
    let x = (-(u * ha - u * la - ha) / (ha * la)).powf(-1.0 / alpha);
    x.clamp(xm, max)
}
