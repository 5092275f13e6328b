#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate eeprom_programmer;
use eeprom_programmer::*;

use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::process::exit;

use dialoguer::Select;
use failure::ResultExt;
use indicatif::{
	ProgressBar,
	ProgressStyle,
};

use eeprom_programmer::eeprom::{
	ParallelPins,
	SerialPins,
};
use eeprom_programmer::gpio::Gpio;
use eeprom_programmer::pages::{
	Page,
	PageIo,
	Paged,
};
use eeprom_programmer::protocol::Programmer;
use eeprom_programmer::sim::{
	SimGpio,
	SimTwoWire,
};
use eeprom_programmer::twi::TwoWire;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid paramater {}: {}", name, e);
		e.context(msg).into()
	})
}

/// ticks a progress bar for every page transferred
struct Progress<P> {
	inner: P,
	bar: ProgressBar,
}

impl<P: PageIo> Progress<P> {
	fn new(inner: P, pages: usize, what: &'static str) -> AResult<Self> {
		let bar = ProgressBar::new(pages as u64);
		bar.set_style(
			ProgressStyle::default_bar()
				.template("{msg:10} [{bar:40.cyan/blue}] {pos}/{len} pages ({eta})")?
				.progress_chars("#>-"),
		);
		bar.set_message(what);
		Ok(Progress { inner, bar })
	}
}

impl<P> Drop for Progress<P> {
	fn drop(&mut self) {
		self.bar.finish();
	}
}

impl<P: PageIo> PageIo for Progress<P> {
	fn page_count(&self) -> usize {
		self.inner.page_count()
	}

	fn read_page(&mut self, page: u8) -> AResult<Page> {
		let data = self.inner.read_page(page)?;
		self.bar.inc(1);
		Ok(data)
	}

	fn write_page(&mut self, page: u8, data: &Page) -> AResult<()> {
		self.inner.write_page(page, data)?;
		self.bar.inc(1);
		Ok(())
	}
}

fn image_pages(image: &[u8]) -> usize {
	(image.len() + pages::PAGE_SIZE - 1) / pages::PAGE_SIZE
}

fn read_rom(io: &mut dyn PageIo, file: &str) -> AResult<()> {
	let page_count = io.page_count();
	let image = pages::read_image(&mut Progress::new(&mut *io, page_count, "Reading")?)?;
	pages::verify_image(&mut Progress::new(&mut *io, page_count, "Verifying")?, &image)?;

	fs::write(file, &image).with_context(|e| format!("couldn't write {}: {}", file, e))?;
	info!("Saved {} bytes to {}", image.len(), file);
	Ok(())
}

fn write_rom(io: &mut dyn PageIo, file: &str) -> AResult<()> {
	let image = fs::read(file).with_context(|e| format!("couldn't read {}: {}", file, e))?;
	info!("Writing {} bytes from {}", image.len(), file);

	pages::write_image(&mut Progress::new(&mut *io, image_pages(&image), "Writing")?, &image)?;
	pages::verify_image(&mut Progress::new(&mut *io, image_pages(&image), "Verifying")?, &image)?;
	info!("Write successful");
	Ok(())
}

fn check_hazards(gpio: &SimGpio) -> AResult<()> {
	let hazards = gpio.hazards();
	for hazard in &hazards {
		error!("simulated board: {:?}", hazard);
	}
	ensure!(hazards.is_empty(), "unsafe line states on the simulated board");
	Ok(())
}

fn simulated_board() -> (SimGpio, SimTwoWire) {
	warn!("Using the simulated board; the EEPROM contents are lost on exit");
	let gpio = SimGpio::new();
	gpio.attach_at28c64(ParallelPins::DEFAULT);
	let bus = SimTwoWire::with_24lc32(gpio.clone(), SerialPins::DEFAULT);
	(gpio, bus)
}

fn with_local<G, B, F>(mut gpio: G, mut bus: B, variant: EepromVariant, f: F) -> AResult<()>
where
	G: Gpio,
	B: TwoWire,
	F: FnOnce(&mut dyn PageIo) -> AResult<()>,
{
	setup_all(&mut gpio, &mut bus)?;
	let mut ee = Eeprom::new(variant.eeprom_type(), gpio, bus);
	let result = ee.init().and_then(|()| {
		f(&mut Paged::new(&mut ee, variant.capacity()))
	});
	let disabled = ee.disable();
	result?;
	disabled
}

fn choose_variant(sub_m: &clap::ArgMatches) -> AResult<EepromVariant> {
	if sub_m.is_present("chip") {
		return get_param(sub_m, "chip");
	}
	let selection = Select::new()
		.with_prompt("Choose the type of EEPROM")
		.items(&EepromVariant::ALL)
		.default(0)
		.interact()?;
	Ok(EepromVariant::ALL[selection])
}

fn choose_port(sub_m: &clap::ArgMatches) -> AResult<String> {
	if let Some(name) = sub_m.value_of("port") {
		return Ok(name.to_string());
	}
	let mut ports = port::find_programmers()?;
	match ports.len() {
		0 => bail!("No programmer found. Make sure it is connected, or name the port with --port"),
		1 => {
			let name = ports.remove(0);
			info!("Using serial port: {}", name);
			Ok(name)
		},
		_ => {
			let selection = Select::new()
				.with_prompt("Multiple programmers available. Choose one")
				.items(&ports)
				.default(0)
				.interact()?;
			Ok(ports.swap_remove(selection))
		},
	}
}

fn local_gpio(sub_m: &clap::ArgMatches) -> AResult<linux::CdevGpio> {
	let chip = sub_m.value_of("gpio_chip").unwrap_or(linux::DEFAULT_GPIO_CHIP);
	linux::CdevGpio::open(chip, get_param(sub_m, "gpio_base")?)
}

fn with_pages<F>(sub_m: &clap::ArgMatches, f: F) -> AResult<()>
where
	F: FnOnce(&mut dyn PageIo) -> AResult<()>,
{
	let variant = choose_variant(sub_m)?;
	info!("EEPROM type: {} ({})", variant, variant.eeprom_type());

	if sub_m.is_present("simulate") {
		let (gpio, bus) = simulated_board();
		with_local(gpio.clone(), bus, variant, f)?;
		return check_hazards(&gpio);
	}

	if sub_m.is_present("local") {
		let gpio = local_gpio(sub_m)?;
		let bus = linux::I2cDev::new(get_param(sub_m, "i2c_bus")?);
		return with_local(gpio, bus, variant, f);
	}

	let mut client = port::connect(&choose_port(sub_m)?, variant)?;
	f(&mut client)
}

/// stdin and stdout as one stream
struct Stdio<R, W>(R, W);

impl<R: Read, W> Read for Stdio<R, W> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl<R, W: Write> Write for Stdio<R, W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.1.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.1.flush()
	}
}

fn serve_stdio<G: Gpio, B: TwoWire>(gpio: G, bus: B) -> AResult<()> {
	let stdin = io::stdin();
	let stdout = io::stdout();
	let mut stream = Stdio(stdin.lock(), stdout.lock());
	Programmer::new(gpio, bus)?.serve(&mut stream)
}

fn serve(sub_m: &clap::ArgMatches) -> AResult<()> {
	if sub_m.is_present("simulate") {
		let (gpio, bus) = simulated_board();
		serve_stdio(gpio.clone(), bus)?;
		return check_hazards(&gpio);
	}

	let gpio = local_gpio(sub_m)?;
	let bus = linux::I2cDev::new(get_param(sub_m, "i2c_bus")?);
	serve_stdio(gpio, bus)
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg simulate: --simulate +global "use a simulated board instead of a programmer")
		(@arg gpio_chip: --("gpio-chip") +global +takes_value default_value(linux::DEFAULT_GPIO_CHIP) "GPIO chip for local hardware")
		(@arg gpio_base: --("gpio-base") +global +takes_value default_value("0") "line offset of controller line 0 on the GPIO chip")
		(@arg i2c_bus: --("i2c-bus") +global +takes_value default_value("1") "2-wire bus N (/dev/i2c-N) for local hardware")
		(@subcommand read =>
			(about: "read the whole EEPROM into a file")
			(@arg chip: -c --chip +takes_value "EEPROM (at28c64, 24lc32); asked for if missing")
			(@arg port: -p --port +takes_value "serial port of the programmer; detected if missing")
			(@arg local: -l --local "use the GPIO lines and 2-wire bus of this host instead of a programmer")
			(@arg FILE: +required "image file to write")
		)
		(@subcommand write =>
			(about: "write a file to the EEPROM and verify it")
			(@arg chip: -c --chip +takes_value "EEPROM (at28c64, 24lc32); asked for if missing")
			(@arg port: -p --port +takes_value "serial port of the programmer; detected if missing")
			(@arg local: -l --local "use the GPIO lines and 2-wire bus of this host instead of a programmer")
			(@arg FILE: +required "image file to read")
		)
		(@subcommand serve =>
			(about: "act as programmer: handle commands on stdin, answer on stdout")
		)
	).get_matches();

	match matches.subcommand() {
		("read", Some(sub_m)) => {
			let file = sub_m.value_of("FILE").ok_or_else(|| format_err!("missing parameter FILE"))?;
			with_pages(sub_m, |io| read_rom(io, file))
		},
		("write", Some(sub_m)) => {
			let file = sub_m.value_of("FILE").ok_or_else(|| format_err!("missing parameter FILE"))?;
			with_pages(sub_m, |io| write_rom(io, file))
		},
		("serve", Some(sub_m)) => {
			serve(sub_m)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
