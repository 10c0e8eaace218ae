//! Distribution functions not provided by `statrs`.
//!
//! The studentized range distribution (the distribution of the range of `k`
//! standard normal means divided by an independent pooled standard deviation
//! with `df` degrees of freedom) drives the family-wise critical values of the
//! Tukey post-hoc comparison. The CDF is evaluated with Gauss-Legendre
//! quadrature (Copenhaver & Holland, 1988); the quantile is found by secant
//! iteration from an analytic starting point.

use crate::error::{Result, StatsError};
use log::warn;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::{LN_2, PI};

pub(crate) fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| StatsError::InvalidParameter(e.to_string()))
}

// 12-point Gauss-Legendre nodes and weights (upper half; symmetric).
const XLEG: [f64; 6] = [
    0.981560634246719250690549090149,
    0.904117256370474856678465866119,
    0.769902674194304687036893833213,
    0.587317954286617447296702418941,
    0.367831498998180193752691536644,
    0.125233408511468915472441369464,
];
const ALEG: [f64; 6] = [
    0.047175336386511827194615961485,
    0.106939325995318430960254718194,
    0.160078328543346226334652529543,
    0.203167426723065921749064455810,
    0.233492536538354808760849898925,
    0.249147045813402785000562436043,
];

// 16-point Gauss-Legendre nodes and weights (upper half; symmetric).
const XLEGQ: [f64; 8] = [
    0.989400934991649932596154173450,
    0.944575023073232576077988415535,
    0.865631202387831743880467897712,
    0.755404408355003033895101194847,
    0.617876244402643748446671764049,
    0.458016777657227386342419442984,
    0.281603550779258913230460501460,
    0.950125098376374401853193354250e-1,
];
const ALEGQ: [f64; 8] = [
    0.271524594117540948517805724560e-1,
    0.622535239386478928628438369944e-1,
    0.951585116824927848099251076022e-1,
    0.124628971255533872052476282192,
    0.149595988816576732081501730547,
    0.169156519395002538189312079030,
    0.182603415044923588866763667969,
    0.189450610455068496285396723208,
];

fn validate(k: f64, df: f64) -> Result<()> {
    if k < 2.0 || df < 2.0 || !k.is_finite() || df.is_nan() {
        return Err(StatsError::InvalidParameter(format!(
            "studentized range needs k >= 2 and df >= 2 (got k = {}, df = {})",
            k, df
        )));
    }
    Ok(())
}

/// P(range of `k` standard normals < `w`), i.e. the range CDF with infinite df.
fn range_probability(w: f64, k: f64, normal: &Normal) -> f64 {
    const UPPER: f64 = 8.0;
    const EXP_FLOOR: f64 = -30.0;
    const POW_FLOOR: f64 = -50.0;
    const QEXPO_CUTOFF: f64 = 60.0;

    let half_w = w * 0.5;
    if half_w >= UPPER {
        return 1.0;
    }

    // probability that all k values fall inside [-w/2, w/2]
    let mut pr_w = 2.0 * normal.cdf(half_w) - 1.0;
    pr_w = if pr_w >= (POW_FLOOR / k).exp() {
        pr_w.powf(k)
    } else {
        0.0
    };

    let intervals = if w > 3.0 { 2.0 } else { 3.0 };
    let step = (UPPER - half_w) / intervals;
    let mut lower = half_w;
    let mut upper = lower + step;
    let k1 = k - 1.0;
    let mut total = 0.0;

    for _ in 0..intervals as usize {
        let mut partial = 0.0;
        let centre = 0.5 * (upper + lower);
        let half_width = 0.5 * (upper - lower);

        for jj in 0..12 {
            let (j, node) = if jj < 6 {
                (jj, -XLEG[jj])
            } else {
                (11 - jj, XLEG[11 - jj])
            };
            let ac = centre + half_width * node;
            let qexpo = ac * ac;
            if qexpo > QEXPO_CUTOFF {
                break;
            }

            let inside = normal.cdf(ac) - normal.cdf(ac - w);
            if inside >= (EXP_FLOOR / k1).exp() {
                partial += ALEG[j] * (-0.5 * qexpo).exp() * inside.powf(k1);
            }
        }
        partial *= 2.0 * half_width * k / (2.0 * PI).sqrt();
        total += partial;
        lower = upper;
        upper += step;
    }

    pr_w += total;
    if pr_w <= EXP_FLOOR.exp() {
        return 0.0;
    }
    pr_w.min(1.0)
}

/// CDF of the studentized range distribution: P(Q <= q) for `k` groups and
/// `df` error degrees of freedom.
pub fn ptukey(q: f64, k: f64, df: f64) -> Result<f64> {
    validate(k, df)?;
    if q <= 0.0 {
        return Ok(0.0);
    }
    if q.is_infinite() {
        return Ok(1.0);
    }

    let normal = standard_normal()?;
    if df > 25_000.0 {
        return Ok(range_probability(q, k, &normal));
    }

    const EPS1: f64 = -30.0;
    const EPS2: f64 = 1.0e-14;

    let f2 = df * 0.5;
    let mut f2lf = f2 * df.ln() - df * LN_2 - ln_gamma(f2);
    let f21 = f2 - 1.0;
    let ff4 = df * 0.25;

    let ulen: f64 = if df <= 100.0 {
        1.0
    } else if df <= 800.0 {
        0.5
    } else if df <= 5000.0 {
        0.25
    } else {
        0.125
    };
    f2lf += ulen.ln();

    let mut answer = 0.0;
    let mut interval_sum = 0.0;
    for i in 1..=50 {
        interval_sum = 0.0;
        let twa1 = (2 * i - 1) as f64 * ulen;

        for jj in 0..16 {
            let (j, offset) = if jj < 8 {
                (jj, -XLEGQ[jj] * ulen)
            } else {
                (jj - 8, XLEGQ[jj - 8] * ulen)
            };
            let t = twa1 + offset;
            let t1 = f2lf + f21 * t.ln() - t * ff4;
            if t1 >= EPS1 {
                let scaled = q * (t * 0.5).sqrt();
                interval_sum += range_probability(scaled, k, &normal) * ALEGQ[j] * t1.exp();
            }
        }

        // at least 1 / ulen intervals, so the left tail is never cut short
        if i as f64 * ulen >= 1.0 && interval_sum <= EPS2 {
            break;
        }
        answer += interval_sum;
    }

    if interval_sum > EPS2 {
        warn!(
            "studentized range CDF did not converge (q = {}, k = {}, df = {})",
            q, k, df
        );
    }
    Ok(answer.clamp(0.0, 1.0))
}

/// Upper-tail probability P(Q > q).
pub fn ptukey_upper(q: f64, k: f64, df: f64) -> Result<f64> {
    Ok((1.0 - ptukey(q, k, df)?).clamp(0.0, 1.0))
}

// Starting value for the quantile search.
fn initial_quantile(p: f64, k: f64, df: f64) -> f64 {
    const P0: f64 = 0.322232421088;
    const Q0: f64 = 0.993484626060e-01;
    const P1: f64 = -1.0;
    const Q1: f64 = 0.588581570495;
    const P2: f64 = -0.342242088547;
    const Q2: f64 = 0.531103462366;
    const P3: f64 = -0.204231210125;
    const Q3: f64 = 0.103537752850;
    const P4: f64 = -0.453642210148e-04;
    const Q4: f64 = 0.38560700634e-02;
    const C1: f64 = 0.8832;
    const C2: f64 = 0.2368;
    const C3: f64 = 1.214;
    const C4: f64 = 1.208;
    const C5: f64 = 1.4142;
    const VMAX: f64 = 120.0;

    let ps = 0.5 - 0.5 * p;
    let yi = (1.0 / (ps * ps)).ln().sqrt();
    let mut t = yi
        + ((((yi * P4 + P3) * yi + P2) * yi + P1) * yi + P0)
            / ((((yi * Q4 + Q3) * yi + Q2) * yi + Q1) * yi + Q0);
    if df < VMAX {
        t += (t * t * t + t) / df / 4.0;
    }
    let mut q = C1 - C2 * t;
    if df < VMAX {
        q += -C3 / df + C4 * t / df;
    }
    t * (q * (k - 1.0).ln() + C5)
}

/// Quantile of the studentized range distribution: the `q` with P(Q <= q) = `p`.
///
/// # Arguments
///
/// * `p` - Probability in [0, 1]
/// * `k` - Number of groups, at least 2
/// * `df` - Error degrees of freedom, at least 2
///
/// # Returns
///
/// The quantile, found by secant iteration on [`ptukey`].
pub fn qtukey(p: f64, k: f64, df: f64) -> Result<f64> {
    validate(k, df)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(StatsError::InvalidParameter(format!(
            "probability must lie in [0, 1], got {}",
            p
        )));
    }
    if p == 0.0 {
        return Ok(0.0);
    }
    if p == 1.0 {
        return Ok(f64::INFINITY);
    }

    const EPS: f64 = 0.0001;
    const MAX_ITER: usize = 50;

    let mut x0 = initial_quantile(p, k, df);
    let mut val_x0 = ptukey(x0, k, df)? - p;
    let mut x1 = if val_x0 > 0.0 {
        (x0 - 1.0).max(0.0)
    } else {
        x0 + 1.0
    };
    let mut val_x1 = ptukey(x1, k, df)? - p;

    let mut answer = x1;
    for _ in 1..MAX_ITER {
        if val_x1 == val_x0 {
            return Ok(x1);
        }
        answer = x1 - (val_x1 * (x1 - x0)) / (val_x1 - val_x0);
        val_x0 = val_x1;
        x0 = x1;
        if answer < 0.0 {
            answer = 0.0;
        }
        val_x1 = ptukey(answer, k, df)? - p;
        x1 = answer;

        if (x1 - x0).abs() < EPS {
            return Ok(answer);
        }
    }

    warn!(
        "studentized range quantile did not converge (p = {}, k = {}, df = {})",
        p, k, df
    );
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn range_of_two_normals() {
        // the range of two standard normals is |X1 - X2| ~ sqrt(2) * |Z|
        let normal = standard_normal().unwrap();
        let w = 1.5;
        let expected = 2.0 * normal.cdf(w / 2.0_f64.sqrt()) - 1.0;
        assert_abs_diff_eq!(range_probability(w, 2.0, &normal), expected, epsilon = 1e-5);
    }

    #[test]
    fn quantile_inverts_cdf() {
        let q = qtukey(0.95, 4.0, 20.0).unwrap();
        assert_abs_diff_eq!(ptukey(q, 4.0, 20.0).unwrap(), 0.95, epsilon = 1e-4);
    }

    #[test]
    fn large_df_integrates_over_shorter_intervals() {
        // tabulated 95% points for k = 3: 3.356 at df = 120, 3.314 at df = infinity
        assert_abs_diff_eq!(ptukey(3.356, 3.0, 120.0).unwrap(), 0.95, epsilon = 1e-4);

        let q = 3.314493;
        let by_df: Vec<f64> = [120.0, 1000.0, 3000.0, 30_000.0]
            .iter()
            .map(|&df| ptukey(q, 3.0, df).unwrap())
            .collect();
        assert!(by_df.windows(2).all(|w| w[0] < w[1]), "{:?}", by_df);
        assert_abs_diff_eq!(by_df[1], 0.94956, epsilon = 1e-4);
        assert_abs_diff_eq!(by_df[3], 0.95, epsilon = 1e-5);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(ptukey(1.0, 1.0, 10.0).is_err());
        assert!(ptukey(1.0, 3.0, 1.0).is_err());
        assert!(qtukey(1.5, 3.0, 10.0).is_err());
    }
}
