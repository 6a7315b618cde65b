use hquant_formula::functions::{cross_over, hhv};
use hquant_formula::indicator::ma;
use hquant_formula::{Bar, FormulaEngine};

fn main() -> hquant_formula::Result<()> {
    let mut engine = FormulaEngine::new(1024)?;

    // Dynamic series: bound to the engine, re-read on every access.
    let close = engine.close();
    let osc = engine.macd(12, 26, 9)?;
    let golden = engine.compile("FAST := MA(C, 5); SLOW := MA(C, 20); CROSS(FAST, SLOW)")?;

    for i in 0..200 {
        let close = 100.0 + (i as f64 * 0.05).sin() * 8.0;
        engine.push_kline(Bar::new(i, close, close + 0.5, close - 0.5, close, 1000.0));
    }

    let fast = ma(&close, 5)?;
    let slow = fast.with_period(20)?;
    println!("close={:.3} ma5={:.3} ma20={:.3}", close.current()?, fast.current()?, slow.current()?);
    println!("macd={:.4}", osc.current()?);
    println!("hhv20={:.3}", hhv(&close, 20)?.current()?);
    println!("cross(ma5, ma20)={}", cross_over(&fast, &slow)?.current()?);
    println!("formula={}", engine.evaluate(&golden)?.last()?);
    Ok(())
}
