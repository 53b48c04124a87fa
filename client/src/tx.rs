//! Transaction descriptions for every contract action.
//!
//! Builders are pure: they never touch the network or session state. Object references, the
//! asset price, the capture fee and gas budgets are fixed here rather than taken from callers.

use crate::{Error, Result};
use suu_types::{
    constants::{ASSET_PRICE, CAPTURE_FEE, GAS_BUDGET},
    Address, BinaryWriter, CommitmentHash, Element, Flow,
};

/// Module holding every entry point of the game contract.
pub const MODULE: &str = "suu";

pub const CLOCK_OBJECT: Address = Address::from_low_u64(0x6);
pub const RANDOM_OBJECT: Address = Address::from_low_u64(0x8);
const CLOCK_INITIAL_VERSION: u64 = 1;

/// A plain value argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PureArg {
    U8(u8),
    U64(u64),
    Address(Address),
    Bytes(Vec<u8>),
}

impl PureArg {
    fn encode(&self, writer: &mut BinaryWriter) {
        match self {
            PureArg::U8(value) => writer.write_u8(*value),
            PureArg::U64(value) => writer.write_u64(*value),
            PureArg::Address(address) => writer.write_bytes(address.as_ref()),
            PureArg::Bytes(bytes) => writer.write_byte_vector(bytes),
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            PureArg::U8(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PureArg::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            PureArg::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PureArg::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Pure(PureArg),
    Shared {
        id: Address,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    fn encode(&self, writer: &mut BinaryWriter) {
        match self {
            Argument::GasCoin => writer.write_u8(0),
            Argument::Input(index) => {
                writer.write_u8(1);
                writer.write_u16(*index);
            }
            Argument::Result(index) => {
                writer.write_u8(2);
                writer.write_u16(*index);
            }
            Argument::NestedResult(command, result) => {
                writer.write_u8(3);
                writer.write_u16(*command);
                writer.write_u16(*result);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    MoveCall {
        package: Address,
        module: String,
        function: String,
        arguments: Vec<Argument>,
    },
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
}

/// Unsigned programmable transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub commands: Vec<Command>,
    /// Explicit gas budget; `None` leaves the choice to the signer.
    pub gas_budget: Option<u64>,
}

impl Transaction {
    fn last_move_call(&self) -> Option<(&Address, &str, &str, &[Argument])> {
        self.commands.iter().rev().find_map(|command| match command {
            Command::MoveCall {
                package,
                module,
                function,
                arguments,
            } => Some((package, module.as_str(), function.as_str(), arguments.as_slice())),
            Command::SplitCoins { .. } => None,
        })
    }

    /// Fully qualified target of the final move call, e.g. `0x..::suu::battle_commit`.
    pub fn target(&self) -> Option<String> {
        self.last_move_call()
            .map(|(package, module, function, _)| format!("{package}::{module}::{function}"))
    }

    pub fn function(&self) -> Option<&str> {
        self.last_move_call().map(|(_, _, function, _)| function)
    }

    /// Arguments of the final move call.
    pub fn call_arguments(&self) -> &[Argument] {
        self.last_move_call()
            .map(|(_, _, _, arguments)| arguments)
            .unwrap_or_default()
    }

    /// Resolves an argument that names a transaction input.
    pub fn input(&self, argument: Argument) -> Option<&Input> {
        match argument {
            Argument::Input(index) => self.inputs.get(usize::from(index)),
            _ => None,
        }
    }

    /// Pure value passed as the `position`-th argument of the final move call.
    pub fn pure_argument(&self, position: usize) -> Option<&PureArg> {
        let argument = *self.call_arguments().get(position)?;
        match self.input(argument)? {
            Input::Pure(pure) => Some(pure),
            Input::Shared { .. } => None,
        }
    }

    /// Serializes the programmable transaction kind in the ledger's native encoding.
    pub fn to_kind_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        // TransactionKind::ProgrammableTransaction
        writer.write_u8(0);

        writer.write_var_uint(self.inputs.len() as u64);
        for input in &self.inputs {
            match input {
                Input::Pure(pure) => {
                    let mut value = BinaryWriter::new();
                    pure.encode(&mut value);
                    writer.write_u8(0);
                    writer.write_byte_vector(&value.into_vec());
                }
                Input::Shared {
                    id,
                    initial_shared_version,
                    mutable,
                } => {
                    // CallArg::Object(ObjectArg::SharedObject)
                    writer.write_u8(1);
                    writer.write_u8(1);
                    writer.write_bytes(id.as_ref());
                    writer.write_u64(*initial_shared_version);
                    writer.write_bool(*mutable);
                }
            }
        }

        writer.write_var_uint(self.commands.len() as u64);
        for command in &self.commands {
            match command {
                Command::MoveCall {
                    package,
                    module,
                    function,
                    arguments,
                } => {
                    writer.write_u8(0);
                    writer.write_bytes(package.as_ref());
                    writer.write_str(module);
                    writer.write_str(function);
                    // no type arguments
                    writer.write_var_uint(0);
                    writer.write_var_uint(arguments.len() as u64);
                    for argument in arguments {
                        argument.encode(&mut writer);
                    }
                }
                Command::SplitCoins { coin, amounts } => {
                    writer.write_u8(2);
                    coin.encode(&mut writer);
                    writer.write_var_uint(amounts.len() as u64);
                    for amount in amounts {
                        amount.encode(&mut writer);
                    }
                }
            }
        }
        writer.into_vec()
    }
}

/// Addresses of one deployment of the game contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub package: Address,
    pub game_object: Address,
    pub game_object_initial_version: u64,
    pub random_initial_version: u64,
}

struct Programmable<'a> {
    deployment: &'a Deployment,
    inputs: Vec<Input>,
    commands: Vec<Command>,
}

impl<'a> Programmable<'a> {
    fn new(deployment: &'a Deployment) -> Self {
        Self {
            deployment,
            inputs: Vec::new(),
            commands: Vec::new(),
        }
    }

    fn input(&mut self, input: Input) -> Argument {
        self.inputs.push(input);
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn pure(&mut self, value: PureArg) -> Argument {
        self.input(Input::Pure(value))
    }

    fn game(&mut self, mutable: bool) -> Argument {
        self.input(Input::Shared {
            id: self.deployment.game_object,
            initial_shared_version: self.deployment.game_object_initial_version,
            mutable,
        })
    }

    fn clock(&mut self) -> Argument {
        self.input(Input::Shared {
            id: CLOCK_OBJECT,
            initial_shared_version: CLOCK_INITIAL_VERSION,
            mutable: false,
        })
    }

    fn random(&mut self) -> Argument {
        self.input(Input::Shared {
            id: RANDOM_OBJECT,
            initial_shared_version: self.deployment.random_initial_version,
            mutable: false,
        })
    }

    /// Splits `amount` off the gas coin; the new coin is the first result of the command.
    fn split_gas(&mut self, amount: u64) -> Argument {
        let amount = self.pure(PureArg::U64(amount));
        self.commands.push(Command::SplitCoins {
            coin: Argument::GasCoin,
            amounts: vec![amount],
        });
        Argument::NestedResult((self.commands.len() - 1) as u16, 0)
    }

    fn call(mut self, function: &str, arguments: Vec<Argument>) -> Self {
        self.commands.push(Command::MoveCall {
            package: self.deployment.package,
            module: MODULE.to_string(),
            function: function.to_string(),
            arguments,
        });
        self
    }

    fn finish(self, gas_budget: Option<u64>) -> Transaction {
        Transaction {
            inputs: self.inputs,
            commands: self.commands,
            gas_budget,
        }
    }
}

fn require_amount(amount: u64) -> Result<u64> {
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    Ok(amount)
}

fn require(field: &'static str, value: u64, valid: bool) -> Result<()> {
    if !valid {
        return Err(Error::InvalidParameter { field, value });
    }
    Ok(())
}

/// Builds one transaction per contract action against a fixed [Deployment].
#[derive(Clone, Debug)]
pub struct TxBuilder {
    deployment: Deployment,
}

impl TxBuilder {
    pub fn new(deployment: Deployment) -> Self {
        Self { deployment }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    fn programmable(&self) -> Programmable<'_> {
        Programmable::new(&self.deployment)
    }

    /// Mints a new asset for [ASSET_PRICE].
    pub fn purchase(&self) -> Transaction {
        let mut p = self.programmable();
        let coin = p.split_gas(ASSET_PRICE);
        let game = p.game(true);
        let random = p.random();
        let clock = p.clock();
        p.call("buy_nft", vec![game, coin, random, clock])
            .finish(Some(GAS_BUDGET))
    }

    pub fn set_active_asset(&self, subject: u64) -> Transaction {
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        p.call("set_active_nft", vec![game, id]).finish(None)
    }

    /// Draws a new encounter for `subject`.
    pub fn randomize_encounter(&self, subject: u64) -> Transaction {
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let random = p.random();
        let clock = p.clock();
        p.call("random_enemy", vec![game, id, random, clock])
            .finish(None)
    }

    /// Publishes `hash` for `subject`. Captures attach [CAPTURE_FEE].
    pub fn commit(&self, flow: Flow, subject: u64, hash: &CommitmentHash) -> Transaction {
        let mut p = self.programmable();
        match flow {
            Flow::Battle => {
                let game = p.game(true);
                let id = p.pure(PureArg::U64(subject));
                let hash = p.pure(PureArg::Bytes(hash.as_ref().to_vec()));
                let clock = p.clock();
                p.call("battle_commit", vec![game, id, hash, clock])
                    .finish(None)
            }
            Flow::Capture => {
                let fee = p.split_gas(CAPTURE_FEE);
                let game = p.game(true);
                let id = p.pure(PureArg::U64(subject));
                let hash = p.pure(PureArg::Bytes(hash.as_ref().to_vec()));
                let clock = p.clock();
                p.call("capture_commit", vec![game, id, hash, fee, clock])
                    .finish(Some(GAS_BUDGET))
            }
        }
    }

    /// Discloses the committed inputs of `commitment`. The secret travels in the clear.
    pub fn reveal(
        &self,
        flow: Flow,
        commitment: Address,
        subject: u64,
        encounter_level: u8,
        encounter_element: u8,
        secret: &str,
    ) -> Transaction {
        let (function, gas_budget) = match flow {
            Flow::Battle => ("battle_reveal_by_address", None),
            Flow::Capture => ("capture_reveal_by_address", Some(GAS_BUDGET)),
        };
        let mut p = self.programmable();
        let game = p.game(true);
        let commitment = p.pure(PureArg::Address(commitment));
        let id = p.pure(PureArg::U64(subject));
        let level = p.pure(PureArg::U8(encounter_level));
        let element = p.pure(PureArg::U8(encounter_element));
        let secret = p.pure(PureArg::Bytes(secret.as_bytes().to_vec()));
        let random = p.random();
        let clock = p.clock();
        p.call(
            function,
            vec![game, commitment, id, level, element, secret, random, clock],
        )
        .finish(gas_budget)
    }

    /// Abandons `commitment` without revealing it.
    pub fn cancel(&self, flow: Flow, commitment: Address, subject: u64) -> Transaction {
        let (function, gas_budget) = match flow {
            Flow::Battle => ("cancel_battle_commitment_by_address", None),
            Flow::Capture => ("cancel_capture_commitment_by_address", Some(GAS_BUDGET)),
        };
        let mut p = self.programmable();
        let game = p.game(true);
        let commitment = p.pure(PureArg::Address(commitment));
        let id = p.pure(PureArg::U64(subject));
        let clock = p.clock();
        p.call(function, vec![game, commitment, id, clock])
            .finish(gas_budget)
    }

    pub fn list(&self, subject: u64, price: u64) -> Result<Transaction> {
        let price = require_amount(price)?;
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let price = p.pure(PureArg::U64(price));
        let clock = p.clock();
        Ok(p.call("list_nft", vec![game, id, price, clock]).finish(None))
    }

    pub fn delist(&self, subject: u64) -> Transaction {
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let clock = p.clock();
        p.call("cancel_listing", vec![game, id, clock]).finish(None)
    }

    /// Buys a listed asset, paying exactly `price`.
    pub fn buy_listed(&self, subject: u64, price: u64) -> Result<Transaction> {
        let price = require_amount(price)?;
        let mut p = self.programmable();
        let coin = p.split_gas(price);
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let clock = p.clock();
        Ok(p.call("buy_listed_nft", vec![game, id, coin, clock])
            .finish(Some(GAS_BUDGET)))
    }

    pub fn deposit(&self, amount: u64) -> Result<Transaction> {
        let amount = require_amount(amount)?;
        let mut p = self.programmable();
        let coin = p.split_gas(amount);
        let game = p.game(true);
        let clock = p.clock();
        Ok(p.call("deposit", vec![game, coin, clock])
            .finish(Some(GAS_BUDGET)))
    }

    pub fn withdraw(&self, amount: u64) -> Result<Transaction> {
        let amount = require_amount(amount)?;
        let mut p = self.programmable();
        let game = p.game(true);
        let amount = p.pure(PureArg::U64(amount));
        let clock = p.clock();
        Ok(p.call("withdraw", vec![game, amount, clock]).finish(None))
    }

    pub fn update_asset_level(&self, subject: u64, level: u8) -> Result<Transaction> {
        require("level", level.into(), level >= 1)?;
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let level = p.pure(PureArg::U8(level));
        let clock = p.clock();
        Ok(p.call("update_nft_level", vec![game, id, level, clock])
            .finish(None))
    }

    pub fn update_asset_element(&self, subject: u64, element: u8) -> Result<Transaction> {
        require(
            "element",
            element.into(),
            Element::from_u8(element).is_some(),
        )?;
        let mut p = self.programmable();
        let game = p.game(true);
        let id = p.pure(PureArg::U64(subject));
        let element = p.pure(PureArg::U8(element));
        let clock = p.clock();
        Ok(p.call("update_nft_element", vec![game, id, element, clock])
            .finish(None))
    }

    fn update_duration(&self, function: &str, field: &'static str, ms: u64) -> Result<Transaction> {
        require(field, ms, ms > 0)?;
        let mut p = self.programmable();
        let game = p.game(true);
        let ms = p.pure(PureArg::U64(ms));
        let clock = p.clock();
        Ok(p.call(function, vec![game, ms, clock]).finish(None))
    }

    /// Sets the level 1 encounter cooldown.
    pub fn update_encounter_cooldown(&self, ms: u64) -> Result<Transaction> {
        self.update_duration("update_enemy_rerandom_cooldown", "cooldown_ms", ms)
    }

    /// Sets the level 1 battle reveal delay.
    pub fn update_battle_reveal_delay(&self, ms: u64) -> Result<Transaction> {
        self.update_duration("update_battle_reveal_delay", "reveal_delay_ms", ms)
    }

    /// Sets the `base` and `max` parameters of the golden encounter chance.
    pub fn update_golden_probability(&self, base: u64, max: u64) -> Transaction {
        let mut p = self.programmable();
        let game = p.game(true);
        let base = p.pure(PureArg::U64(base));
        let max = p.pure(PureArg::U64(max));
        let clock = p.clock();
        p.call("update_golden_monster_probability", vec![game, base, max, clock])
            .finish(None)
    }

    /// Read-only call of a getter; the game object is always the first argument.
    pub fn inspect(&self, function: &str, args: Vec<PureArg>) -> Transaction {
        let mut p = self.programmable();
        let mut arguments = vec![p.game(false)];
        arguments.extend(args.into_iter().map(|arg| p.pure(arg)));
        p.call(function, arguments).finish(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suu_types::commitment_hash;

    fn builder() -> TxBuilder {
        TxBuilder::new(Deployment {
            package: Address::from_low_u64(0xaa),
            game_object: Address::from_low_u64(0xbb),
            game_object_initial_version: 7,
            random_initial_version: 9,
        })
    }

    fn shared(tx: &Transaction, position: usize) -> (Address, u64, bool) {
        let argument = tx.call_arguments()[position];
        match tx.input(argument) {
            Some(Input::Shared {
                id,
                initial_shared_version,
                mutable,
            }) => (*id, *initial_shared_version, *mutable),
            other => panic!("expected shared object, got {other:?}"),
        }
    }

    #[test]
    fn test_battle_commit_layout() {
        let hash = commitment_hash(42, 3, 1, "secret");
        let tx = builder().commit(Flow::Battle, 42, &hash);
        assert_eq!(tx.target().unwrap(), format!("{}::suu::battle_commit", Address::from_low_u64(0xaa)));
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::U64(42)));
        assert_eq!(tx.pure_argument(2).and_then(PureArg::as_bytes), Some(hash.as_ref()));
        assert_eq!(shared(&tx, 3), (CLOCK_OBJECT, 1, false));
        assert_eq!(tx.gas_budget, None);
    }

    #[test]
    fn test_capture_commit_attaches_fee() {
        let hash = commitment_hash(42, 3, 1, "secret");
        let tx = builder().commit(Flow::Capture, 42, &hash);
        assert_eq!(tx.function(), Some("capture_commit"));
        assert_eq!(tx.gas_budget, Some(GAS_BUDGET));
        let Command::SplitCoins { coin, amounts } = &tx.commands[0] else {
            panic!("expected split");
        };
        assert_eq!(*coin, Argument::GasCoin);
        assert_eq!(
            tx.input(amounts[0]),
            Some(&Input::Pure(PureArg::U64(CAPTURE_FEE)))
        );
        assert_eq!(tx.call_arguments()[3], Argument::NestedResult(0, 0));
    }

    #[test]
    fn test_reveal_carries_secret_in_clear() {
        let commitment = Address::from_low_u64(0xc000);
        let tx = builder().reveal(Flow::Capture, commitment, 42, 3, 1, "open sesame");
        assert_eq!(tx.function(), Some("capture_reveal_by_address"));
        assert_eq!(tx.gas_budget, Some(GAS_BUDGET));
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::Address(commitment)));
        assert_eq!(tx.pure_argument(2), Some(&PureArg::U64(42)));
        assert_eq!(tx.pure_argument(3), Some(&PureArg::U8(3)));
        assert_eq!(tx.pure_argument(4), Some(&PureArg::U8(1)));
        assert_eq!(
            tx.pure_argument(5).and_then(PureArg::as_bytes),
            Some(&b"open sesame"[..])
        );
        assert_eq!(shared(&tx, 6), (RANDOM_OBJECT, 9, false));
        assert_eq!(shared(&tx, 7), (CLOCK_OBJECT, 1, false));

        let battle = builder().reveal(Flow::Battle, commitment, 42, 3, 1, "open sesame");
        assert_eq!(battle.function(), Some("battle_reveal_by_address"));
        assert_eq!(battle.pure_argument(1), Some(&PureArg::Address(commitment)));
        assert_eq!(battle.gas_budget, None);
    }

    #[test]
    fn test_cancel_layout() {
        let commitment = Address::from_low_u64(0xc001);
        let battle = builder().cancel(Flow::Battle, commitment, 5);
        assert_eq!(battle.function(), Some("cancel_battle_commitment_by_address"));
        assert_eq!(battle.gas_budget, None);

        let capture = builder().cancel(Flow::Capture, commitment, 5);
        assert_eq!(capture.function(), Some("cancel_capture_commitment_by_address"));
        assert_eq!(capture.gas_budget, Some(GAS_BUDGET));
        for tx in [battle, capture] {
            assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
            assert_eq!(tx.pure_argument(1), Some(&PureArg::Address(commitment)));
            assert_eq!(tx.pure_argument(2), Some(&PureArg::U64(5)));
            assert_eq!(shared(&tx, 3), (CLOCK_OBJECT, 1, false));
            assert_eq!(tx.call_arguments().len(), 4);
        }
    }

    #[test]
    fn test_purchase_layout() {
        let tx = builder().purchase();
        assert_eq!(tx.function(), Some("buy_nft"));
        assert_eq!(tx.gas_budget, Some(GAS_BUDGET));
        let Command::SplitCoins { coin, amounts } = &tx.commands[0] else {
            panic!("expected split");
        };
        assert_eq!(*coin, Argument::GasCoin);
        assert_eq!(
            tx.input(amounts[0]),
            Some(&Input::Pure(PureArg::U64(ASSET_PRICE)))
        );
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(tx.call_arguments()[1], Argument::NestedResult(0, 0));
        assert_eq!(shared(&tx, 2), (RANDOM_OBJECT, 9, false));
        assert_eq!(shared(&tx, 3), (CLOCK_OBJECT, 1, false));
    }

    #[test]
    fn test_set_active_asset_layout() {
        let tx = builder().set_active_asset(17);
        assert_eq!(tx.function(), Some("set_active_nft"));
        assert_eq!(tx.call_arguments().len(), 2);
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::U64(17)));
        assert_eq!(tx.gas_budget, None);
    }

    #[test]
    fn test_randomize_encounter_layout() {
        let tx = builder().randomize_encounter(17);
        assert_eq!(tx.function(), Some("random_enemy"));
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::U64(17)));
        assert_eq!(shared(&tx, 2), (RANDOM_OBJECT, 9, false));
        assert_eq!(shared(&tx, 3), (CLOCK_OBJECT, 1, false));
        assert_eq!(tx.gas_budget, None);
    }

    #[test]
    fn test_listing_layouts() {
        let listed = builder().list(8, 2_500_000_000).unwrap();
        assert_eq!(listed.function(), Some("list_nft"));
        assert_eq!(shared(&listed, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(listed.pure_argument(1), Some(&PureArg::U64(8)));
        assert_eq!(listed.pure_argument(2), Some(&PureArg::U64(2_500_000_000)));
        assert_eq!(shared(&listed, 3), (CLOCK_OBJECT, 1, false));
        assert!(listed.commands.iter().all(|c| matches!(c, Command::MoveCall { .. })));

        let delisted = builder().delist(8);
        assert_eq!(delisted.function(), Some("cancel_listing"));
        assert_eq!(delisted.call_arguments().len(), 3);
        assert_eq!(shared(&delisted, 0), (Address::from_low_u64(0xbb), 7, true));
        assert_eq!(delisted.pure_argument(1), Some(&PureArg::U64(8)));
        assert_eq!(shared(&delisted, 2), (CLOCK_OBJECT, 1, false));
    }

    #[test]
    fn test_golden_probability_layout() {
        let tx = builder().update_golden_probability(5, 40);
        assert_eq!(tx.function(), Some("update_golden_monster_probability"));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::U64(5)));
        assert_eq!(tx.pure_argument(2), Some(&PureArg::U64(40)));
        assert_eq!(shared(&tx, 3), (CLOCK_OBJECT, 1, false));
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let builder = builder();
        assert!(matches!(builder.deposit(0), Err(Error::InvalidAmount)));
        assert!(matches!(builder.withdraw(0), Err(Error::InvalidAmount)));
        assert!(matches!(builder.list(1, 0), Err(Error::InvalidAmount)));
        assert!(matches!(builder.buy_listed(1, 0), Err(Error::InvalidAmount)));
        assert!(builder.deposit(1).is_ok());
    }

    #[test]
    fn test_buy_listed_pays_exact_price() {
        let tx = builder().buy_listed(8, 2_500_000_000).unwrap();
        let Command::SplitCoins { amounts, .. } = &tx.commands[0] else {
            panic!("expected split");
        };
        assert_eq!(
            tx.input(amounts[0]),
            Some(&Input::Pure(PureArg::U64(2_500_000_000)))
        );
        assert_eq!(tx.function(), Some("buy_listed_nft"));
    }

    #[test]
    fn test_admin_ranges() {
        let builder = builder();
        assert!(matches!(
            builder.update_asset_level(1, 0),
            Err(Error::InvalidParameter { field: "level", value: 0 })
        ));
        assert!(matches!(
            builder.update_asset_element(1, 5),
            Err(Error::InvalidParameter { field: "element", value: 5 })
        ));
        assert!(builder.update_asset_element(1, 4).is_ok());
        assert!(builder.update_encounter_cooldown(0).is_err());
        assert!(builder.update_battle_reveal_delay(30_000).is_ok());
    }

    #[test]
    fn test_kind_bytes_layout() {
        let tx = builder().withdraw(5).unwrap();
        let mut expected = vec![0u8, 3];
        // game object, shared and mutable
        expected.extend([1, 1]);
        expected.extend(Address::from_low_u64(0xbb).as_ref());
        expected.extend(7u64.to_le_bytes());
        expected.push(1);
        // amount
        expected.extend([0, 8]);
        expected.extend(5u64.to_le_bytes());
        // clock
        expected.extend([1, 1]);
        expected.extend(CLOCK_OBJECT.as_ref());
        expected.extend(1u64.to_le_bytes());
        expected.push(0);
        // one move call
        expected.extend([1, 0]);
        expected.extend(Address::from_low_u64(0xaa).as_ref());
        expected.push(3);
        expected.extend(b"suu");
        expected.push(8);
        expected.extend(b"withdraw");
        expected.extend([0, 3, 1, 0, 0, 1, 1, 0, 1, 2, 0]);
        assert_eq!(tx.to_kind_bytes(), expected);
    }

    #[test]
    fn test_split_encodes_nested_result() {
        let bytes = builder().deposit(10).unwrap().to_kind_bytes();
        // SplitCoins(GasCoin, [Input(0)]) precedes the move call
        let split = [2u8, 0, 1, 1, 0];
        assert!(bytes.windows(split.len()).any(|w| w == split));
        // the move call consumes NestedResult(0, 0)
        let nested = [3u8, 0, 0, 0, 0];
        assert!(bytes.windows(nested.len()).any(|w| w == nested));
    }

    #[test]
    fn test_inspect_prepends_game_object() {
        let tx = builder().inspect("get_nft", vec![PureArg::U64(3)]);
        assert_eq!(shared(&tx, 0), (Address::from_low_u64(0xbb), 7, false));
        assert_eq!(tx.pure_argument(1), Some(&PureArg::U64(3)));
    }
}
